//! Typed statements synthesized from instructions.

use std::fmt::Write as _;

/// Comparison used in `WHERE` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Predicate {
    /// `<col> = ?`; a NULL operand never matches.
    #[default]
    Equals,
    /// `<col> IS ?`; NULL matches NULL.
    Is,
}

impl Predicate {
    const fn operator(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Is => "IS",
        }
    }
}

/// A statement shape, independent of the values bound to it.
///
/// Parameters are bound positionally: all insert values, or the `SET`
/// values followed by the `WHERE` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement<'a> {
    /// `INSERT INTO t VALUES (?, ...)`.
    Insert {
        /// Target table.
        table: &'a str,
        /// Number of placeholders.
        columns: usize,
    },
    /// `DELETE FROM t WHERE ...`.
    Delete {
        /// Target table.
        table: &'a str,
        /// Predicate columns, in column order.
        filter: Vec<&'a str>,
        /// Predicate operator.
        predicate: Predicate,
    },
    /// `UPDATE t SET ... WHERE ...`.
    Update {
        /// Target table.
        table: &'a str,
        /// Assigned columns, in column order.
        assign: Vec<&'a str>,
        /// Predicate columns, in column order.
        filter: Vec<&'a str>,
        /// Predicate operator.
        predicate: Predicate,
    },
}

impl Statement<'_> {
    /// Renders the statement as SQL text with `?` placeholders.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        match self {
            Self::Insert { table, columns } => {
                sql.push_str("INSERT INTO ");
                push_identifier(&mut sql, table);
                sql.push_str(" VALUES (");
                for i in 0..*columns {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                }
                sql.push(')');
            }
            Self::Delete {
                table,
                filter,
                predicate,
            } => {
                sql.push_str("DELETE FROM ");
                push_identifier(&mut sql, table);
                push_where(&mut sql, filter, *predicate);
            }
            Self::Update {
                table,
                assign,
                filter,
                predicate,
            } => {
                sql.push_str("UPDATE ");
                push_identifier(&mut sql, table);
                sql.push_str(" SET ");
                for (i, column) in assign.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    push_identifier(&mut sql, column);
                    sql.push_str(" = ?");
                }
                push_where(&mut sql, filter, *predicate);
            }
        }
        sql
    }
}

/// Quotes an identifier with double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_identifier(&mut out, name);
    out
}

fn push_identifier(sql: &mut String, name: &str) {
    sql.push('"');
    for ch in name.chars() {
        if ch == '"' {
            sql.push('"');
        }
        sql.push(ch);
    }
    sql.push('"');
}

fn push_where(sql: &mut String, filter: &[&str], predicate: Predicate) {
    sql.push_str(" WHERE ");
    for (i, column) in filter.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        push_identifier(sql, column);
        let _ = write!(sql, " {} ?", predicate.operator());
    }
}
