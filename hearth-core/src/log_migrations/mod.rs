//! Schema of logs.duckdb, embedded at build time

/// One schema step, applied at most once per database
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Creates the bookkeeping table; safe to run on every open
pub const BOOKKEEPING: Migration = Migration {
    name: "000_migrations.sql",
    sql: include_str!("000_migrations.sql"),
};

/// Schema steps after bookkeeping, oldest first. New files get the next
/// number and go at the end.
pub const LOG_MIGRATIONS: &[Migration] = &[Migration {
    name: "001_initial_schema.sql",
    sql: include_str!("001_initial_schema.sql"),
}];

/// Steps not yet in `applied`, in order
pub fn pending<'a>(applied: &'a [String]) -> impl Iterator<Item = &'static Migration> + 'a {
    LOG_MIGRATIONS
        .iter()
        .filter(move |m| !applied.iter().any(|name| name == m.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_ordered_and_unique() {
        let names: Vec<&str> = LOG_MIGRATIONS.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert!(names.iter().all(|n| *n > BOOKKEEPING.name));
    }

    #[test]
    fn test_pending_skips_applied() {
        assert_eq!(pending(&[]).count(), LOG_MIGRATIONS.len());
        let applied = vec!["001_initial_schema.sql".to_string()];
        assert_eq!(pending(&applied).count(), LOG_MIGRATIONS.len() - 1);
    }
}
