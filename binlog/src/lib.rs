pub mod b_type;
pub mod column_type;
pub mod ddl;
pub mod gtid;
pub mod gtid_event;
pub mod header;
pub mod query_event;
pub mod reader;
pub mod row;
pub mod table_map;
