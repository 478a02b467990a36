//! Domain models for command trees, selections, and evaluation outcomes.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::domain::errors::TreeError;

const COMMAND_KEY: &str = "command";
const COMMANDS_KEY: &str = "commands";
const ARGS_KEY: &str = "args";
const SCOPE_KEY: &str = "scope";
const LEGACY_SCOPE_KEY: &str = "context";
const FOR_EACH_SELECTION_KEY: &str = "forEachSelection";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// One text cursor or range. `active` is the end that moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    /// An empty selection (a bare cursor) at `position`.
    pub fn caret(position: Position) -> Self {
        Self::new(position, position)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }
}

/// A node of a command tree: either a single command or a group of nodes.
///
/// Trees deserialize from the keybinding-style JSON shape (`command` vs `commands`) and reject
/// anything else with [`TreeError::Malformed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum CommandNode {
    Leaf(Leaf),
    Group(Group),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub command: String,
    pub args: Option<Value>,
    pub scope: Option<Value>,
    pub for_each_selection: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub commands: Commands,
    pub scope: Option<Value>,
    pub for_each_selection: bool,
}

/// Children of a [`Group`].
#[derive(Debug, Clone, PartialEq)]
pub enum Commands {
    Sequence(Vec<CommandNode>),
    Nested(Box<CommandNode>),
}

impl Leaf {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: None,
            scope: None,
            for_each_selection: false,
        }
    }

    pub fn with_args(mut self, args: impl Into<Value>) -> Self {
        self.args = Some(args.into());
        self
    }
}

impl Group {
    pub fn new(commands: Commands) -> Self {
        Self {
            commands,
            scope: None,
            for_each_selection: false,
        }
    }
}

impl From<Leaf> for CommandNode {
    fn from(value: Leaf) -> Self {
        CommandNode::Leaf(value)
    }
}

impl From<Group> for CommandNode {
    fn from(value: Group) -> Self {
        CommandNode::Group(value)
    }
}

impl CommandNode {
    /// Shorthand for a leaf without args, scope, or fan-out.
    pub fn leaf(command: impl Into<String>) -> Self {
        Leaf::new(command).into()
    }

    pub fn sequence(children: impl IntoIterator<Item = CommandNode>) -> Self {
        Group::new(Commands::Sequence(children.into_iter().collect())).into()
    }

    pub fn nested(child: CommandNode) -> Self {
        Group::new(Commands::Nested(Box::new(child))).into()
    }

    pub fn with_scope(mut self, scope: impl Into<Value>) -> Self {
        let scope = Some(scope.into());
        match &mut self {
            CommandNode::Leaf(leaf) => leaf.scope = scope,
            CommandNode::Group(group) => group.scope = scope,
        }
        self
    }

    pub fn with_for_each_selection(mut self, enabled: bool) -> Self {
        match &mut self {
            CommandNode::Leaf(leaf) => leaf.for_each_selection = enabled,
            CommandNode::Group(group) => group.for_each_selection = enabled,
        }
        self
    }

    pub fn scope(&self) -> Option<&Value> {
        match self {
            CommandNode::Leaf(leaf) => leaf.scope.as_ref(),
            CommandNode::Group(group) => group.scope.as_ref(),
        }
    }

    pub fn for_each_selection(&self) -> bool {
        match self {
            CommandNode::Leaf(leaf) => leaf.for_each_selection,
            CommandNode::Group(group) => group.for_each_selection,
        }
    }

    /// Whether this node or any descendant requests per-selection fan-out.
    pub fn uses_fan_out(&self) -> bool {
        if self.for_each_selection() {
            return true;
        }
        match self {
            CommandNode::Leaf(_) => false,
            CommandNode::Group(group) => match &group.commands {
                Commands::Sequence(children) => children.iter().any(CommandNode::uses_fan_out),
                Commands::Nested(child) => child.uses_fan_out(),
            },
        }
    }

    /// Parse a node from its JSON description.
    pub fn from_value(value: &Value) -> Result<Self, TreeError> {
        parse_node(value, "$")
    }

    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        let (scope, for_each_selection) = match self {
            CommandNode::Leaf(leaf) => {
                fields.insert(COMMAND_KEY.into(), Value::String(leaf.command.clone()));
                if let Some(args) = &leaf.args {
                    fields.insert(ARGS_KEY.into(), args.clone());
                }
                (&leaf.scope, leaf.for_each_selection)
            }
            CommandNode::Group(group) => {
                let commands = match &group.commands {
                    Commands::Sequence(children) => {
                        Value::Array(children.iter().map(CommandNode::to_value).collect())
                    }
                    Commands::Nested(child) => child.to_value(),
                };
                fields.insert(COMMANDS_KEY.into(), commands);
                (&group.scope, group.for_each_selection)
            }
        };
        if let Some(scope) = scope {
            fields.insert(SCOPE_KEY.into(), scope.clone());
        }
        if for_each_selection {
            fields.insert(FOR_EACH_SELECTION_KEY.into(), Value::Bool(true));
        }
        Value::Object(fields)
    }
}

impl TryFrom<Value> for CommandNode {
    type Error = TreeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        CommandNode::from_value(&value)
    }
}

impl From<CommandNode> for Value {
    fn from(value: CommandNode) -> Self {
        value.to_value()
    }
}

fn parse_node(value: &Value, path: &str) -> Result<CommandNode, TreeError> {
    let Value::Object(fields) = value else {
        return Err(TreeError::malformed(path, "expected an object"));
    };

    let scope = parse_scope(fields, path)?;
    let for_each_selection = match fields.get(FOR_EACH_SELECTION_KEY) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            return Err(TreeError::malformed(
                path,
                "`forEachSelection` must be a boolean",
            ));
        }
    };

    match (fields.get(COMMAND_KEY), fields.get(COMMANDS_KEY)) {
        (Some(_), Some(_)) => Err(TreeError::malformed(
            path,
            "node has both `command` and `commands`",
        )),
        (None, None) => Err(TreeError::malformed(
            path,
            "node has neither `command` nor `commands`",
        )),
        (Some(Value::String(command)), None) => Ok(CommandNode::Leaf(Leaf {
            command: command.clone(),
            args: fields.get(ARGS_KEY).cloned(),
            scope,
            for_each_selection,
        })),
        (Some(_), None) => Err(TreeError::malformed(path, "`command` must be a string")),
        (None, Some(Value::Array(items))) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_node(item, &format!("{path}.commands[{index}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CommandNode::Group(Group {
                commands: Commands::Sequence(children),
                scope,
                for_each_selection,
            }))
        }
        (None, Some(child)) => {
            let child = parse_node(child, &format!("{path}.commands"))?;
            Ok(CommandNode::Group(Group {
                commands: Commands::Nested(Box::new(child)),
                scope,
                for_each_selection,
            }))
        }
    }
}

fn parse_scope(fields: &Map<String, Value>, path: &str) -> Result<Option<Value>, TreeError> {
    let scope = fields.get(SCOPE_KEY).filter(|value| !value.is_null());
    let legacy = fields.get(LEGACY_SCOPE_KEY).filter(|value| !value.is_null());
    match (scope, legacy) {
        (Some(_), Some(_)) => Err(TreeError::malformed(
            path,
            "node has both `scope` and `context`",
        )),
        (scope, legacy) => Ok(scope.or(legacy).cloned()),
    }
}

/// Result of evaluating a command tree.
///
/// `Absent` marks a skipped branch; `Value(Value::Null)` is a command that ran and returned
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Outcome {
    #[default]
    Absent,
    Value(Value),
    List(Vec<Outcome>),
}

impl Outcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, Outcome::Absent)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Outcome]> {
        match self {
            Outcome::List(items) => Some(items),
            _ => None,
        }
    }

    /// Flatten into plain JSON, mapping `Absent` to `null`.
    pub fn into_json(self) -> Value {
        match self {
            Outcome::Absent => Value::Null,
            Outcome::Value(value) => value,
            Outcome::List(items) => Value::Array(items.into_iter().map(Outcome::into_json).collect()),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Absent => serializer.serialize_none(),
            Outcome::Value(value) => value.serialize(serializer),
            Outcome::List(items) => items.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn parses_leaf_with_args_and_scope() {
        let node = CommandNode::from_value(&json!({
            "command": "cursorDown",
            "args": 2,
            "scope": "editorTextFocus",
        }))
        .unwrap();

        let CommandNode::Leaf(leaf) = node else {
            panic!("expected leaf");
        };
        assert_eq!(leaf.command, "cursorDown");
        assert_eq!(leaf.args, Some(json!(2)));
        assert_eq!(leaf.scope, Some(json!("editorTextFocus")));
        assert!(!leaf.for_each_selection);
    }

    #[test]
    fn parses_nested_group_and_sequence() {
        let node = CommandNode::from_value(&json!({
            "forEachSelection": true,
            "commands": {
                "commands": [{"command": "a"}, {"command": "b", "context": ["x", ["y"]]}]
            }
        }))
        .unwrap();

        assert!(node.for_each_selection());
        let CommandNode::Group(Group {
            commands: Commands::Nested(inner),
            ..
        }) = &node
        else {
            panic!("expected nested group");
        };
        let CommandNode::Group(Group {
            commands: Commands::Sequence(children),
            ..
        }) = inner.as_ref()
        else {
            panic!("expected sequence");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].scope(), Some(&json!(["x", ["y"]])));
    }

    #[test]
    fn null_scope_means_unscoped() {
        let node = CommandNode::from_value(&json!({"command": "a", "scope": null})).unwrap();
        assert_eq!(node.scope(), None);
    }

    #[test]
    fn rejects_malformed_nodes_with_path() {
        let cases = [
            (json!(42), "$"),
            (json!({}), "$"),
            (json!({"command": "a", "commands": []}), "$"),
            (json!({"commands": [{"command": "a"}, {"args": 1}]}), "$.commands[1]"),
            (json!({"commands": {"command": 7}}), "$.commands"),
            (json!({"command": "a", "forEachSelection": "yes"}), "$"),
            (json!({"command": "a", "scope": "x", "context": "y"}), "$"),
        ];

        for (value, expected_path) in cases {
            match CommandNode::from_value(&value) {
                Err(TreeError::Malformed { path, .. }) => assert_eq!(path, expected_path, "{value}"),
                other => panic!("expected malformed error for {value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn serializes_back_to_keybinding_shape() {
        let node = CommandNode::sequence([
            Leaf::new("a").with_args(json!({"n": 1})).into(),
            CommandNode::leaf("b").with_scope("s"),
        ])
        .with_for_each_selection(true);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "commands": [{"command": "a", "args": {"n": 1}}, {"command": "b", "scope": "s"}],
                "forEachSelection": true,
            })
        );
        let parsed: CommandNode = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn detects_fan_out_in_descendants() {
        let plain = CommandNode::sequence([CommandNode::leaf("a")]);
        let deep = CommandNode::sequence([CommandNode::nested(
            CommandNode::leaf("a").with_for_each_selection(true),
        )]);
        assert!(!plain.uses_fan_out());
        assert!(deep.uses_fan_out());
    }

    #[test]
    fn outcome_serializes_absent_as_null() {
        let outcome = Outcome::List(vec![Outcome::Absent, Outcome::Value(json!("X"))]);
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!([null, "X"]));
        assert_eq!(outcome.into_json(), json!([null, "X"]));
    }
}
