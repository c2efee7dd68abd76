//! Structural diff engine.
//!
//! Compares a target [`Table`] with the current one and produces the typed
//! [`Action`]s that evolve the current shape into the target shape.
//!
//! Only table creation, table renames, column type changes and column
//! nullability changes are inferred. Columns present on one side only are
//! left alone: turning them into `column_create`/`column_drop` would guess at
//! renames, so that stays with whoever writes the migration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Column, ColumnType, Table, TypeArgs};

/// One structural change.
///
/// `table` is always the name the action operates on. After a
/// [`Action::TableRename`], subsequent actions already use the new name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create a table with all of its columns.
    TableCreate {
        /// Table name.
        table: String,
        /// Full column map.
        columns: BTreeMap<String, Column>,
    },
    /// Drop a table.
    TableDrop {
        /// Table name.
        table: String,
    },
    /// Rename a table.
    TableRename {
        /// Current name.
        table: String,
        /// New name.
        to: String,
    },
    /// Add a column.
    ColumnCreate {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
    },
    /// Drop a column.
    ColumnDrop {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Rename a column.
    ColumnRename {
        /// Table name.
        table: String,
        /// Current column name.
        column: String,
        /// New column name.
        to: String,
    },
    /// Change a column's type.
    ColumnUpdateType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New type.
        to: ColumnType,
        /// Arguments of the new type.
        #[serde(default, skip_serializing_if = "TypeArgs::is_empty")]
        type_args: TypeArgs,
    },
    /// Change a column's nullability.
    ColumnUpdateNullable {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New nullability.
        nullable: bool,
    },
    /// Change or remove a column's default.
    ColumnUpdateDefault {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New raw default expression, `None` drops it.
        default: Option<Value>,
    },
    /// Add or remove a single-column unique constraint.
    ColumnUpdateUnique {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Whether the column becomes unique.
        unique: bool,
        /// Constraint name; defaults to `uk_<table>_<column>`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
}

impl Action {
    /// Returns the snake_case tag of this action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TableCreate { .. } => "table_create",
            Self::TableDrop { .. } => "table_drop",
            Self::TableRename { .. } => "table_rename",
            Self::ColumnCreate { .. } => "column_create",
            Self::ColumnDrop { .. } => "column_drop",
            Self::ColumnRename { .. } => "column_rename",
            Self::ColumnUpdateType { .. } => "column_update_type",
            Self::ColumnUpdateNullable { .. } => "column_update_nullable",
            Self::ColumnUpdateDefault { .. } => "column_update_default",
            Self::ColumnUpdateUnique { .. } => "column_update_unique",
        }
    }

    /// Returns the table this action operates on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::TableCreate { table, .. }
            | Self::TableDrop { table }
            | Self::TableRename { table, .. }
            | Self::ColumnCreate { table, .. }
            | Self::ColumnDrop { table, .. }
            | Self::ColumnRename { table, .. }
            | Self::ColumnUpdateType { table, .. }
            | Self::ColumnUpdateNullable { table, .. }
            | Self::ColumnUpdateDefault { table, .. }
            | Self::ColumnUpdateUnique { table, .. } => table,
        }
    }
}

/// Computes the actions that turn `current` into `target`.
///
/// With no current table the result is a single [`Action::TableCreate`]
/// carrying the full target column map. Otherwise a name change yields a
/// leading [`Action::TableRename`], followed by per-column type and
/// nullability changes in column name order.
#[must_use]
pub fn diff(target: &Table, current: Option<&Table>) -> Vec<Action> {
    let Some(current) = current else {
        return vec![Action::TableCreate {
            table: target.name.clone(),
            columns: target.columns.clone(),
        }];
    };

    let mut actions = Vec::new();

    if target.name != current.name {
        actions.push(Action::TableRename {
            table: current.name.clone(),
            to: target.name.clone(),
        });
    }
    let table = &target.name;

    let names: BTreeSet<&str> = current
        .columns
        .keys()
        .chain(target.columns.keys())
        .map(String::as_str)
        .collect();

    for name in names {
        let (Some(old), Some(new)) = (current.columns.get(name), target.columns.get(name)) else {
            continue;
        };

        if old.column_type != new.column_type {
            actions.push(Action::ColumnUpdateType {
                table: table.clone(),
                column: name.to_string(),
                to: new.column_type.clone(),
                type_args: new.type_args,
            });
        }

        if old.nullable != new.nullable {
            actions.push(Action::ColumnUpdateNullable {
                table: table.clone(),
                column: name.to_string(),
                nullable: new.nullable,
            });
        }
    }

    actions
}

/// Diffs every target table against the same-named current table.
///
/// Tables are visited in name order. Current tables without a target
/// counterpart produce nothing.
#[must_use]
pub fn diff_snapshot(
    target: &BTreeMap<String, Table>,
    current: &BTreeMap<String, Table>,
) -> Vec<Action> {
    target
        .iter()
        .flat_map(|(name, table)| diff(table, current.get(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnType::BigInt).primary().not_null())
            .column(Column::new("name", ColumnType::Varchar).length(64).not_null())
            .column(Column::new("bio", ColumnType::Text))
    }

    #[test]
    fn test_identical_tables_produce_no_actions() {
        let table = users();
        assert!(diff(&table, Some(&table)).is_empty());
    }

    #[test]
    fn test_absent_current_creates_table() {
        let table = users();
        let actions = diff(&table, None);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::TableCreate { table: name, columns } => {
                assert_eq!(name, "users");
                assert_eq!(columns, &table.columns);
            }
            other => panic!("expected table_create, got {other:?}"),
        }
    }

    #[test]
    fn test_rename_comes_first_and_renames_following_actions() {
        let current = users();
        let mut target = users();
        target.name = "members".to_string();
        target.columns.get_mut("bio").unwrap().nullable = false;

        let actions = diff(&target, Some(&current));
        assert_eq!(
            actions,
            vec![
                Action::TableRename {
                    table: "users".to_string(),
                    to: "members".to_string(),
                },
                Action::ColumnUpdateNullable {
                    table: "members".to_string(),
                    column: "bio".to_string(),
                    nullable: false,
                },
            ]
        );
    }

    #[test]
    fn test_type_and_nullable_changes_are_independent() {
        let current = Table::new("t").column(Column::new("c1", ColumnType::Integer).not_null());
        let target = Table::new("t").column(Column::new("c1", ColumnType::Text));

        let actions = diff(&target, Some(&current));
        assert_eq!(
            actions,
            vec![
                Action::ColumnUpdateType {
                    table: "t".to_string(),
                    column: "c1".to_string(),
                    to: ColumnType::Text,
                    type_args: TypeArgs::default(),
                },
                Action::ColumnUpdateNullable {
                    table: "t".to_string(),
                    column: "c1".to_string(),
                    nullable: true,
                },
            ]
        );
    }

    #[test]
    fn test_added_and_dropped_columns_are_ignored() {
        let current = users();
        let target = Table::new("users")
            .column(Column::new("id", ColumnType::BigInt).primary().not_null())
            .column(Column::new("name", ColumnType::Varchar).length(64).not_null())
            .column(Column::new("email", ColumnType::Text));

        assert!(diff(&target, Some(&current)).is_empty());
    }

    #[test]
    fn test_default_and_comment_changes_are_ignored() {
        let current = users();
        let mut target = users();
        let bio = target.columns.get_mut("bio").unwrap();
        bio.default_value = Some(Value::String("''".to_string()));
        bio.comment = Some("about me".to_string());

        assert!(diff(&target, Some(&current)).is_empty());
    }

    #[test]
    fn test_columns_are_visited_in_name_order() {
        let current = Table::new("t")
            .column(Column::new("zeta", ColumnType::Integer))
            .column(Column::new("alpha", ColumnType::Integer));
        let target = Table::new("t")
            .column(Column::new("zeta", ColumnType::BigInt))
            .column(Column::new("alpha", ColumnType::BigInt));

        let columns: Vec<String> = diff(&target, Some(&current))
            .into_iter()
            .map(|action| match action {
                Action::ColumnUpdateType { column, .. } => column,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(columns, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_action_json_shape() {
        let action = Action::TableRename {
            table: "a".to_string(),
            to: "b".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "action": "table_rename", "table": "a", "to": "b" })
        );
        assert_eq!(action.name(), "table_rename");
        assert_eq!(action.table(), "a");
    }

    #[test]
    fn test_diff_snapshot_visits_target_tables() {
        let mut current = BTreeMap::new();
        current.insert("users".to_string(), users());

        let mut target = BTreeMap::new();
        target.insert("users".to_string(), users());
        target.insert(
            "posts".to_string(),
            Table::new("posts").column(Column::new("id", ColumnType::BigInt)),
        );

        let actions = diff_snapshot(&target, &current);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name(), "table_create");
        assert_eq!(actions[0].table(), "posts");
    }
}
