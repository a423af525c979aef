//! Field model: typed user inputs declared in a project descriptor
//!
//! A [`Field`] is constructed from its descriptor entry by
//! [`Field::from_descriptor`]. Resolution never touches the project directly;
//! it returns a [`Resolution`] describing the value, any side-channel context
//! variables (`<name>_index`, `<name>_key`) and an optional [`Effect`] on the
//! project (an extra include file or a subproject). The project applies it.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::core::error::{Error, Result};
use crate::core::prompt::Prompter;
use crate::core::renderer::Renderable;
use crate::core::utils::{eval_bool, parse_answer};

/// Type-specific part of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text with a default
    Default { default: String },
    /// Yes/no question
    Confirm { default: bool },
    /// One label out of a list. `default` is a 0-based index.
    Choice { choices: Vec<String>, default: usize },
    /// One key out of a mapping; the field value becomes the mapped value
    ChoiceDict {
        keys: Vec<String>,
        values: Vec<Value>,
        default: usize,
    },
    /// A choice naming a file below `includes/` that gets compiled
    FileSelect {
        choices: Vec<String>,
        default: usize,
        filename: Option<String>,
    },
    /// Includes another template as a subproject
    Project { template: String },
}

impl FieldKind {
    /// Type tag as written in descriptors
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Default { .. } => "default",
            FieldKind::Confirm { .. } => "confirm",
            FieldKind::Choice { .. } => "choice",
            FieldKind::ChoiceDict { .. } => "dict",
            FieldKind::FileSelect { .. } => "file_select",
            FieldKind::Project { .. } => "project",
        }
    }
}

/// Side effect of a resolved field on the running project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Compile `includes/<file>`, optionally under a different output name
    Include {
        file: String,
        filename: Option<String>,
    },
    /// Fill and compile the named template as part of this project
    Subproject { template: String },
}

/// Outcome of resolving one field
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub vars: Vec<(String, Value)>,
    pub effect: Option<Effect>,
}

impl Resolution {
    fn value(value: Value) -> Self {
        Self {
            value,
            vars: Vec::new(),
            effect: None,
        }
    }

    fn var(mut self, key: String, value: impl Into<Value>) -> Self {
        self.vars.push((key, value.into()));
        self
    }

    fn effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// A single user-facing input
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Resolved value; set once per project run
    pub value: Option<Value>,
    pub help: Option<String>,
    /// Rendered and evaluated with [`eval_bool`]; the field is skipped when false
    pub condition: Option<String>,
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
            help: None,
            condition: None,
            optional: false,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Build a field from its descriptor entry.
    ///
    /// Shorthands: a string or number is a free-text default, a boolean a
    /// confirmation and a list a choice. Objects select their kind with
    /// `type`; without it the kind is inferred from `choices` and `default`.
    pub fn from_descriptor(name: &str, def: &Value) -> Result<Self> {
        let kind = match def {
            Value::Bool(b) => FieldKind::Confirm { default: *b },
            Value::Array(_) => FieldKind::Choice {
                choices: choice_list(name, Some(def))?,
                default: 0,
            },
            Value::Object(map) => return Self::from_object(name, map),
            other => FieldKind::Default {
                default: label(other),
            },
        };
        Ok(Self::new(name, kind))
    }

    fn from_object(name: &str, map: &Map<String, Value>) -> Result<Self> {
        let default = map.get("default");
        let choices = map.get("choices");

        let tag = match map.get("type") {
            Some(Value::String(tag)) => tag.to_lowercase(),
            Some(other) => {
                return Err(Error::config(format!(
                    "Field '{name}' has an invalid type tag {other}"
                )));
            }
            None => match (choices, default) {
                (Some(Value::Object(_)), _) => "dict".to_string(),
                (Some(Value::Array(_)), _) | (_, Some(Value::Array(_))) => "choice".to_string(),
                (_, Some(Value::Bool(_))) => "confirm".to_string(),
                _ => "default".to_string(),
            },
        };

        let kind = match tag.as_str() {
            "default" | "str" | "string" | "text" => FieldKind::Default {
                default: default.map(label).unwrap_or_default(),
            },
            "confirm" | "bool" | "boolean" => FieldKind::Confirm {
                default: match default {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::String(s)) => eval_bool(s),
                    _ => false,
                },
            },
            "choice" | "choices" | "select" => {
                let choices = choice_list(name, choices.or(default))?;
                let default = choice_default(&choices, default);
                FieldKind::Choice { choices, default }
            }
            "dict" | "dict_choice" | "choice_dict" => {
                let Some(Value::Object(mapping)) = choices else {
                    return Err(Error::config(format!(
                        "Field '{name}' needs an object of choices"
                    )));
                };
                if mapping.is_empty() {
                    return Err(Error::config(format!("Field '{name}' has no choices")));
                }
                let keys: Vec<String> = mapping.keys().cloned().collect();
                let values = mapping.values().cloned().collect();
                let default = choice_default(&keys, default);
                FieldKind::ChoiceDict {
                    keys,
                    values,
                    default,
                }
            }
            "file_select" | "fileselect" | "file" => {
                let choices = choice_list(name, choices)?;
                let default = choice_default(&choices, default);
                FieldKind::FileSelect {
                    choices,
                    default,
                    filename: map.get("filename").and_then(Value::as_str).map(String::from),
                }
            }
            "project" | "template" | "subproject" => FieldKind::Project {
                template: map
                    .get("template")
                    .or_else(|| map.get("project"))
                    .and_then(Value::as_str)
                    .unwrap_or(name)
                    .to_string(),
            },
            other => {
                return Err(Error::config(format!(
                    "Unknown type '{other}' for field '{name}'. Available types: \
                     default, confirm, choice, dict, file_select, project"
                )));
            }
        };

        let mut field = Self::new(name, kind);
        field.help = map.get("help").and_then(Value::as_str).map(String::from);
        field.condition = match map.get("condition") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        };
        field.optional = map.get("optional").and_then(Value::as_bool).unwrap_or(false);
        Ok(field)
    }

    /// Whether the (rendered) condition allows this field
    pub fn is_enabled(&self) -> bool {
        self.condition.as_deref().is_none_or(eval_bool)
    }

    /// Resolve the field interactively.
    ///
    /// A field that already carries a value is returned unchanged.
    pub fn prompt(&mut self, prompter: &mut dyn Prompter) -> Result<Resolution> {
        if let Some(value) = &self.value {
            info!(field = %self.name, "Used previous value");
            return Ok(Resolution::value(value.clone()));
        }

        if let Some(help) = &self.help {
            prompter.say(help);
        }

        let resolution = match &self.kind {
            FieldKind::Default { default } => {
                Resolution::value(Value::String(self.ask_text(prompter, default)?))
            }
            FieldKind::Confirm { default } => {
                Resolution::value(Value::Bool(self.ask_confirm(prompter, *default)?))
            }
            FieldKind::Choice { choices, default } => {
                let index = self.ask_choice(prompter, choices, *default)?;
                Resolution::value(Value::String(choices[index].clone()))
                    .var(self.index_key(), index)
            }
            FieldKind::ChoiceDict {
                keys,
                values,
                default,
            } => {
                let index = self.ask_choice(prompter, keys, *default)?;
                Resolution::value(values[index].clone())
                    .var(self.index_key(), index)
                    .var(format!("{}_key", self.name), keys[index].clone())
            }
            FieldKind::FileSelect {
                choices,
                default,
                filename,
            } => {
                let index = self.ask_choice(prompter, choices, *default)?;
                Resolution::value(Value::String(choices[index].clone()))
                    .var(self.index_key(), index)
                    .effect(Effect::Include {
                        file: choices[index].clone(),
                        filename: filename.clone(),
                    })
            }
            FieldKind::Project { template } => {
                Resolution::value(Value::String(template.clone())).effect(Effect::Subproject {
                    template: template.clone(),
                })
            }
        };

        self.value = Some(resolution.value.clone());
        Ok(resolution)
    }

    /// Resolve the field from a prefilled value.
    ///
    /// String values are expected to be rendered already.
    pub fn accept(&mut self, value: Value) -> Resolution {
        let resolution = match &self.kind {
            FieldKind::Default { .. } => Resolution::value(value),
            FieldKind::Confirm { .. } => Resolution::value(Value::Bool(match &value {
                Value::Bool(b) => *b,
                Value::String(s) => eval_bool(s),
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                _ => false,
            })),
            FieldKind::Choice { choices, .. } => match find_choice(choices, &value) {
                Some(index) => Resolution::value(Value::String(choices[index].clone()))
                    .var(self.index_key(), index),
                None => Resolution::value(value),
            },
            FieldKind::ChoiceDict { keys, values, .. } => match find_choice(keys, &value) {
                Some(index) => Resolution::value(values[index].clone())
                    .var(self.index_key(), index)
                    .var(format!("{}_key", self.name), keys[index].clone()),
                None => Resolution::value(value),
            },
            FieldKind::FileSelect {
                choices, filename, ..
            } => {
                let mut resolution = match find_choice(choices, &value) {
                    Some(index) => Resolution::value(Value::String(choices[index].clone()))
                        .var(self.index_key(), index),
                    None => Resolution::value(value),
                };
                if let Value::String(file) = &resolution.value {
                    resolution.effect = Some(Effect::Include {
                        file: file.clone(),
                        filename: filename.clone(),
                    });
                }
                resolution
            }
            FieldKind::Project { .. } => {
                let template = label(&value);
                Resolution::value(Value::String(template.clone()))
                    .effect(Effect::Subproject { template })
            }
        };

        self.value = Some(resolution.value.clone());
        resolution
    }

    fn index_key(&self) -> String {
        format!("{}_index", self.name)
    }

    fn ask_text(&self, prompter: &mut dyn Prompter, default: &str) -> Result<String> {
        let question = format!("Enter a value for \"{}\"", self.name);
        loop {
            match prompter.ask(&question, Some(default))? {
                None if default.is_empty() && !self.optional => {
                    return Err(Error::MissingValue(self.name.clone()));
                }
                None => return Ok(default.to_string()),
                Some(answer) if answer.is_empty() => {
                    if default.is_empty() && !self.optional {
                        prompter.say(&format!("\"{}\" is required", self.name));
                        continue;
                    }
                    return Ok(default.to_string());
                }
                Some(answer) => return Ok(answer),
            }
        }
    }

    fn ask_confirm(&self, prompter: &mut dyn Prompter, default: bool) -> Result<bool> {
        let question = if default {
            format!("Do you want to disable \"{}\"?", self.name)
        } else {
            format!("Do you want to enable \"{}\"?", self.name)
        };
        loop {
            let answer = match prompter.ask(&question, Some("n"))? {
                None => return Ok(default),
                Some(answer) if answer.trim().is_empty() => false,
                Some(answer) => match parse_answer(&answer) {
                    Some(yes) => yes,
                    None => {
                        prompter.say("Please answer yes or no");
                        continue;
                    }
                },
            };
            return Ok(if default { !answer } else { answer });
        }
    }

    /// Returns the 0-based index of the chosen entry
    fn ask_choice(
        &self,
        prompter: &mut dyn Prompter,
        choices: &[String],
        default: usize,
    ) -> Result<usize> {
        if choices.len() == 1 {
            return Ok(0);
        }

        prompter.say(&format!("Choose a value for \"{}\"", self.name));
        for (n, choice) in choices.iter().enumerate() {
            prompter.say(&format!("  {} - \"{choice}\"", n + 1));
        }

        let question = format!("Select from 1..{}", choices.len());
        let shown_default = (default + 1).to_string();
        loop {
            let answer = match prompter.ask(&question, Some(&shown_default))? {
                None => return Ok(default),
                Some(answer) => answer,
            };
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(n - 1),
                _ => {
                    warn!(field = %self.name, answer, "Invalid choice");
                    prompter.say(&format!("{answer} is not a valid choice"));
                }
            }
        }
    }
}

impl Renderable for Field {
    fn template_slots(&mut self) -> Vec<&mut String> {
        let mut slots: Vec<&mut String> = Vec::new();
        if let Some(help) = &mut self.help {
            slots.push(help);
        }
        if let Some(condition) = &mut self.condition {
            slots.push(condition);
        }
        match &mut self.kind {
            FieldKind::Default { default } => slots.push(default),
            FieldKind::Confirm { .. } => {}
            FieldKind::Choice { choices, .. } => slots.extend(choices.iter_mut()),
            FieldKind::ChoiceDict { keys, .. } => slots.extend(keys.iter_mut()),
            FieldKind::FileSelect {
                choices, filename, ..
            } => {
                slots.extend(choices.iter_mut());
                if let Some(filename) = filename {
                    slots.push(filename);
                }
            }
            FieldKind::Project { template } => slots.push(template),
        }
        slots
    }
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn labels(items: &[Value]) -> Vec<String> {
    items.iter().map(label).collect()
}

fn choice_list(name: &str, value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        Some(Value::Array(items)) if !items.is_empty() => Ok(labels(items)),
        Some(Value::Array(_)) => Err(Error::config(format!("Field '{name}' has no choices"))),
        _ => Err(Error::config(format!(
            "Field '{name}' needs a list of choices"
        ))),
    }
}

/// Integer defaults are 1-based as shown to the user, strings name a label
fn choice_default(choices: &[String], default: Option<&Value>) -> usize {
    let index = match default {
        Some(Value::Number(n)) => n.as_u64().map(|n| n.saturating_sub(1) as usize),
        Some(Value::String(s)) => choices.iter().position(|c| c == s),
        _ => None,
    };
    index.filter(|i| *i < choices.len()).unwrap_or(0)
}

/// Index of a prefilled value among the choices. Numbers are 0-based indices.
fn find_choice(choices: &[String], value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => choices.iter().position(|c| c == s),
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .filter(|n| *n < choices.len()),
        _ => None,
    }
}
