//! Portable SQL to driver-native SQL.
//!
//! Templates are written once with backtick identifiers and `?` placeholders.
//! MySQL and SQLite accept that form as-is; PostgreSQL needs `$n`
//! placeholders and double-quoted identifiers. This is the only place the
//! rewrite happens.

use std::borrow::Cow;

/// SQL flavour of the connected database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Rewrite a portable statement into this dialect.
    ///
    /// Characters inside single-quoted literals are left alone.
    pub fn translate<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::MySql | Self::Sqlite => Cow::Borrowed(sql),
            Self::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut in_literal = false;
                let mut index = 0;
                for ch in sql.chars() {
                    match ch {
                        '\'' => {
                            in_literal = !in_literal;
                            out.push(ch);
                        }
                        '?' if !in_literal => {
                            index += 1;
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        '`' if !in_literal => out.push('"'),
                        _ => out.push(ch),
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}
