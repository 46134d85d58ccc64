//! Shortcut plist generation from the AST.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::Menu;
use super::ast::{MenuItem, Program, Statement, Value};
use super::plist::PlistValue;
use crate::error::ParseError;
use crate::source::LineCursor;

const CLIENT_VERSION: i64 = 900;
const DEFAULT_GLYPH: i64 = 61440;
const DEFAULT_COLOR: i64 = 4_282_601_983;
/// Object replacement character marking a variable attachment in text.
const ATTACHMENT: &str = "\u{FFFC}";

const COLORS: &[(&str, i64)] = &[
    ("red", 4_282_601_983),
    ("darkorange", 4_251_333_119),
    ("orange", 4_271_458_815),
    ("yellow", 4_274_264_319),
    ("green", 4_292_093_695),
    ("teal", 431_817_727),
    ("lightblue", 1_440_408_063),
    ("blue", 463_140_863),
    ("darkblue", 946_986_751),
    ("violet", 2_071_128_575),
    ("purple", 3_679_049_983),
    ("pink", 3_980_825_855),
    ("taupe", 3_031_607_807),
    ("gray", 2_846_468_607),
    ("darkgray", 255),
];

#[derive(Clone, Copy)]
enum ParamKind {
    Text,
    Number,
}

struct ActionDef {
    name: &'static str,
    identifier: &'static str,
    params: &'static [(&'static str, ParamKind)],
    required: usize,
}

const ACTIONS: &[ActionDef] = &[
    ActionDef {
        name: "alert",
        identifier: "is.workflow.actions.alert",
        params: &[
            ("WFAlertActionMessage", ParamKind::Text),
            ("WFAlertActionTitle", ParamKind::Text),
        ],
        required: 1,
    },
    ActionDef {
        name: "show",
        identifier: "is.workflow.actions.showresult",
        params: &[("Text", ParamKind::Text)],
        required: 1,
    },
    ActionDef {
        name: "comment",
        identifier: "is.workflow.actions.comment",
        params: &[("WFCommentActionText", ParamKind::Text)],
        required: 1,
    },
    ActionDef {
        name: "wait",
        identifier: "is.workflow.actions.delay",
        params: &[("WFDelayTime", ParamKind::Number)],
        required: 1,
    },
    ActionDef {
        name: "vibrate",
        identifier: "is.workflow.actions.vibrate",
        params: &[],
        required: 0,
    },
    ActionDef {
        name: "setClipboard",
        identifier: "is.workflow.actions.setclipboard",
        params: &[("WFInput", ParamKind::Text)],
        required: 1,
    },
    ActionDef {
        name: "openURL",
        identifier: "is.workflow.actions.openurl",
        params: &[("WFInput", ParamKind::Text)],
        required: 1,
    },
];

pub(super) struct GeneratorOutput {
    pub(super) document: PlistValue,
    pub(super) variables: BTreeMap<String, Value>,
    pub(super) menus: Vec<Menu>,
}

/// Walks the program once, checking each statement at the cursor's line.
pub(super) struct Generator<'a> {
    source: &'a str,
    cursor: &'a LineCursor,
    filename: &'a str,
    actions: Vec<PlistValue>,
    variables: BTreeMap<String, Value>,
    menus: Vec<Menu>,
    color: i64,
    glyph: i64,
    ids: Box<dyn FnMut() -> String + 'a>,
}

impl<'a> Generator<'a> {
    pub(super) fn new(source: &'a str, cursor: &'a LineCursor, filename: &'a str) -> Self {
        Self {
            source,
            cursor,
            filename,
            actions: Vec::new(),
            variables: BTreeMap::new(),
            menus: Vec::new(),
            color: DEFAULT_COLOR,
            glyph: DEFAULT_GLYPH,
            ids: Box::new(shortcuts_uuid),
        }
    }

    /// Replace the random identifier source, e.g. for reproducible output.
    #[cfg(test)]
    #[must_use]
    pub(super) fn with_id_source(mut self, ids: impl FnMut() -> String + 'a) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub(super) fn generate(mut self, program: &Program) -> Result<GeneratorOutput, ParseError> {
        self.statements(&program.statements)?;
        self.cursor.reset();

        let document = PlistValue::dict([
            ("WFWorkflowActions", PlistValue::Array(self.actions)),
            (
                "WFWorkflowClientVersion",
                PlistValue::string(CLIENT_VERSION.to_string()),
            ),
            (
                "WFWorkflowIcon",
                PlistValue::dict([
                    ("WFWorkflowIconGlyphNumber", PlistValue::Integer(self.glyph)),
                    ("WFWorkflowIconStartColor", PlistValue::Integer(self.color)),
                ]),
            ),
            ("WFWorkflowImportQuestions", PlistValue::Array(vec![])),
            (
                "WFWorkflowInputContentItemClasses",
                PlistValue::Array(vec![]),
            ),
            (
                "WFWorkflowMinimumClientVersion",
                PlistValue::Integer(CLIENT_VERSION),
            ),
            ("WFWorkflowTypes", PlistValue::Array(vec![])),
        ]);

        Ok(GeneratorOutput {
            document,
            variables: self.variables,
            menus: self.menus,
        })
    }

    fn statements(&mut self, statements: &[Statement]) -> Result<(), ParseError> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), ParseError> {
        self.cursor.set(statement.line().saturating_sub(1));
        match statement {
            Statement::Define { key, value, .. } => self.define(key, value),
            Statement::Assignment { name, value, .. } => self.assignment(name, value),
            Statement::Call { action, args, .. } => self.call(action, args),
            Statement::Menu {
                prompt,
                items,
                line,
            } => self.menu(prompt, items, *line),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at_cursor(message, self.source, self.cursor, Some(self.filename))
    }

    fn define(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        match key {
            "color" => {
                let lowered = value.to_lowercase();
                self.color = COLORS
                    .iter()
                    .find(|(name, _)| *name == lowered)
                    .map(|(_, code)| *code)
                    .ok_or_else(|| {
                        let names: Vec<&str> = COLORS.iter().map(|(n, _)| *n).collect();
                        self.error(format!("unknown icon color `{value}`"))
                            .with_hint(format!("Available colors: {}", names.join(", ")))
                    })?;
            }
            "glyph" => {
                self.glyph = value
                    .parse()
                    .map_err(|_| self.error(format!("glyph must be a number, got `{value}`")))?;
            }
            _ => {
                return Err(self
                    .error(format!("unknown definition `{key}`"))
                    .with_hint("Supported definitions are `color` and `glyph`."));
            }
        }
        Ok(())
    }

    fn assignment(&mut self, name: &str, value: &Value) -> Result<(), ParseError> {
        let resolved = self.resolve(value)?;
        let input = match value {
            Value::Text(text) => {
                let uuid = self.next_uuid();
                self.push_action(
                    "is.workflow.actions.gettext",
                    vec![
                        ("WFTextActionText", PlistValue::string(text.clone())),
                        ("UUID", PlistValue::string(uuid.clone())),
                    ],
                );
                action_output("Text", &uuid)
            }
            Value::Number(number) => {
                let uuid = self.next_uuid();
                self.push_action(
                    "is.workflow.actions.number",
                    vec![
                        ("WFNumberActionNumber", number_value(number)),
                        ("UUID", PlistValue::string(uuid.clone())),
                    ],
                );
                action_output("Number", &uuid)
            }
            Value::Variable(other) => variable_attachment(other),
        };
        self.push_action(
            "is.workflow.actions.setvariable",
            vec![
                ("WFVariableName", PlistValue::string(name)),
                ("WFInput", input),
            ],
        );
        self.variables.insert(name.to_string(), resolved);
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<(), ParseError> {
        let Some(def) = ACTIONS.iter().find(|a| a.name == name) else {
            let names: Vec<&str> = ACTIONS.iter().map(|a| a.name).collect();
            return Err(self
                .error(format!("unknown action `{name}`"))
                .with_hint(format!("Available actions: {}", names.join(", "))));
        };

        if args.len() < def.required || args.len() > def.params.len() {
            let expected = if def.required == def.params.len() {
                def.required.to_string()
            } else {
                format!("{} to {}", def.required, def.params.len())
            };
            return Err(self.error(format!(
                "`{name}` takes {expected} argument(s), got {}",
                args.len()
            )));
        }

        let mut params = Vec::with_capacity(args.len());
        for (arg, (key, kind)) in args.iter().zip(def.params) {
            params.push((*key, self.parameter(name, arg, *kind)?));
        }
        self.push_action(def.identifier, params);
        Ok(())
    }

    fn parameter(&self, action: &str, arg: &Value, kind: ParamKind) -> Result<PlistValue, ParseError> {
        match (arg, kind) {
            (Value::Variable(name), _) => {
                self.lookup(name)?;
                Ok(text_token(name))
            }
            (Value::Text(text), ParamKind::Text) => Ok(PlistValue::string(text.clone())),
            (Value::Number(number), ParamKind::Text) => Ok(PlistValue::string(number.clone())),
            (Value::Number(number), ParamKind::Number) => Ok(number_value(number)),
            (Value::Text(_), ParamKind::Number) => {
                Err(self.error(format!("`{action}` expects a number")))
            }
        }
    }

    fn menu(&mut self, prompt: &Value, items: &[MenuItem], line: usize) -> Result<(), ParseError> {
        let prompt_value = match prompt {
            Value::Variable(name) => {
                self.lookup(name)?;
                text_token(name)
            }
            literal => PlistValue::string(literal.as_text().unwrap_or_default()),
        };

        let mut labels = Vec::with_capacity(items.len());
        for item in items {
            self.cursor.set(item.line.saturating_sub(1));
            let Some(label) = item.label.as_text() else {
                return Err(self.error("menu item labels must be literals"));
            };
            labels.push(label.to_string());
        }

        let group = self.next_uuid();
        self.push_action(
            "is.workflow.actions.choosefrommenu",
            vec![
                ("GroupingIdentifier", PlistValue::string(group.clone())),
                ("WFControlFlowMode", PlistValue::Integer(0)),
                ("WFMenuPrompt", prompt_value),
                (
                    "WFMenuItems",
                    PlistValue::Array(labels.iter().cloned().map(PlistValue::String).collect()),
                ),
            ],
        );

        for (item, label) in items.iter().zip(&labels) {
            self.push_action(
                "is.workflow.actions.choosefrommenu",
                vec![
                    ("GroupingIdentifier", PlistValue::string(group.clone())),
                    ("WFControlFlowMode", PlistValue::Integer(1)),
                    ("WFMenuItemTitle", PlistValue::string(label.clone())),
                ],
            );
            self.statements(&item.body)?;
        }

        self.push_action(
            "is.workflow.actions.choosefrommenu",
            vec![
                ("GroupingIdentifier", PlistValue::string(group)),
                ("WFControlFlowMode", PlistValue::Integer(2)),
            ],
        );

        self.menus.push(Menu {
            prompt: prompt.clone(),
            items: labels,
            line,
        });
        Ok(())
    }

    fn resolve(&self, value: &Value) -> Result<Value, ParseError> {
        match value {
            Value::Variable(name) => self.lookup(name).cloned(),
            literal => Ok(literal.clone()),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Value, ParseError> {
        self.variables.get(name).ok_or_else(|| {
            self.error(format!("undefined variable `@{name}`"))
                .with_hint("Declare it first, e.g. `@name = \"value\"`.")
        })
    }

    fn push_action(&mut self, identifier: &str, params: Vec<(&str, PlistValue)>) {
        self.actions.push(PlistValue::dict([
            ("WFWorkflowActionIdentifier", PlistValue::string(identifier)),
            ("WFWorkflowActionParameters", PlistValue::dict(params)),
        ]));
    }

    fn next_uuid(&mut self) -> String {
        (self.ids)()
    }
}

/// Upper-case random v4 UUID, the form Shortcuts writes itself.
fn shortcuts_uuid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

fn number_value(number: &str) -> PlistValue {
    match number.parse::<i64>() {
        Ok(integer) => PlistValue::Integer(integer),
        Err(_) => number
            .parse::<f64>()
            .map_or_else(|_| PlistValue::string(number), PlistValue::Real),
    }
}

fn action_output(name: &str, uuid: &str) -> PlistValue {
    PlistValue::dict([
        (
            "Value",
            PlistValue::dict([
                ("OutputName", PlistValue::string(name)),
                ("OutputUUID", PlistValue::string(uuid)),
                ("Type", PlistValue::string("ActionOutput")),
            ]),
        ),
        (
            "WFSerializationType",
            PlistValue::string("WFTextTokenAttachment"),
        ),
    ])
}

fn variable_attachment(name: &str) -> PlistValue {
    PlistValue::dict([
        (
            "Value",
            PlistValue::dict([
                ("Type", PlistValue::string("Variable")),
                ("VariableName", PlistValue::string(name)),
            ]),
        ),
        (
            "WFSerializationType",
            PlistValue::string("WFTextTokenAttachment"),
        ),
    ])
}

/// Text parameter consisting of a single variable attachment.
fn text_token(name: &str) -> PlistValue {
    PlistValue::dict([
        (
            "Value",
            PlistValue::dict([
                (
                    "attachmentsByRange",
                    PlistValue::dict([(
                        "{0, 1}",
                        PlistValue::dict([
                            ("Type", PlistValue::string("Variable")),
                            ("VariableName", PlistValue::string(name)),
                        ]),
                    )]),
                ),
                ("string", PlistValue::string(ATTACHMENT)),
            ]),
        ),
        (
            "WFSerializationType",
            PlistValue::string("WFTextTokenString"),
        ),
    ])
}
