//! `QUERY_EVENT` payload parsing (§4.4): extracts the default schema name
//! and SQL text at the fixed offsets the post-header dictates.
//!
//! ```text
//! slave_proxy_id(4) | exec_time(4) | db_name_len(1) | error_code(2) | varblock_len(2)
//! status_vars(varblock_len) | db_name(db_name_len) | NUL | sql_text
//! ```

use common::err::{CResult, ReError};

#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub database: String,
    pub sql: String,
}

impl QueryEvent {
    pub fn parse(body: &[u8]) -> CResult<QueryEvent> {
        if body.len() < 13 {
            return Err(ReError::new("QUERY_EVENT body too short for post-header"));
        }
        let db_name_len = body[8] as usize;
        let varblock_len = u16::from_le_bytes([body[11], body[12]]) as usize;

        let db_start = 13 + varblock_len;
        let db_end = db_start + db_name_len;
        if body.len() < db_end + 1 {
            return Err(ReError::new("QUERY_EVENT body truncated before db name"));
        }
        let database = String::from_utf8_lossy(&body[db_start..db_end]).into_owned();

        let sql_start = db_end + 1; // skip NUL terminator
        // The framer appends its own trailing NUL past event_size (§4.3) so
        // `QUERY_EVENT` text can be treated as NUL-terminated; strip it here
        // rather than carrying a stray `\0` into the DDL recognizer.
        let sql_bytes = body[sql_start..].strip_suffix(&[0u8]).unwrap_or(&body[sql_start..]);
        let sql = String::from_utf8_lossy(sql_bytes).into_owned();

        Ok(QueryEvent { database, sql })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(db: &str, sql: &str) -> Vec<u8> {
        let mut body = vec![0u8; 13];
        body[8] = db.len() as u8;
        body.extend_from_slice(db.as_bytes());
        body.push(0);
        body.extend_from_slice(sql.as_bytes());
        body
    }

    #[test]
    fn extracts_db_and_sql() {
        let body = sample("test", "CREATE TABLE t (id INT)");
        let event = QueryEvent::parse(&body).unwrap();
        assert_eq!(event.database, "test");
        assert_eq!(event.sql, "CREATE TABLE t (id INT)");
    }

    #[test]
    fn rejects_short_body() {
        assert!(QueryEvent::parse(&[0u8; 5]).is_err());
    }
}
