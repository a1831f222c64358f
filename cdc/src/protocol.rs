//! Line-oriented CDC client protocol (§6).
//!
//! ```text
//! REGISTER UUID=<36-char-uuid>[, TYPE={AVRO|JSON}]
//! REQUEST-DATA <filestem>[ <domain>-<server_id>-<sequence>]
//! ```
//! Anything else is echoed back prefixed `ECHO:`.

use binlog::gtid::Gtid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Avro,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Register { uuid: String, format: Format },
    RequestData { filestem: String, gtid: Option<Gtid> },
    Unknown(String),
}

pub const ERR_REGISTRATION_FAILED: &str = "ERR, code 12, msg: Registration failed";
pub const ERR_REQUEST_DATA_NO_DATA: &str = "ERR REQUEST-DATA with no data";
pub const ERR_AVRO_FILE_NOT_SPECIFIED: &str = "ERR avro file not specified";

pub fn err_no_file(name: &str) -> String {
    format!("ERR NO-FILE File '{name}' not found.")
}

pub fn parse_line(line: &str) -> ClientRequest {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix("REGISTER ") {
        if let Some(request) = parse_register(rest) {
            return request;
        }
        return ClientRequest::Unknown(line.to_string());
    }
    if let Some(rest) = line.strip_prefix("REQUEST-DATA") {
        return parse_request_data(rest.trim_start());
    }
    ClientRequest::Unknown(line.to_string())
}

fn parse_register(rest: &str) -> Option<ClientRequest> {
    let mut uuid = None;
    let mut format = Format::Avro;
    for part in rest.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("UUID=") {
            uuid = Some(v.trim().to_string());
        } else if let Some(v) = part.strip_prefix("TYPE=") {
            format = match v.trim() {
                "JSON" => Format::Json,
                _ => Format::Avro,
            };
        }
    }
    let uuid = uuid?;
    if uuid.len() != 36 {
        return None;
    }
    Some(ClientRequest::Register { uuid, format })
}

fn parse_request_data(rest: &str) -> ClientRequest {
    let mut parts = rest.split_whitespace();
    let filestem = parts.next().unwrap_or("").to_string();
    let gtid = parts.next().and_then(Gtid::parse);
    ClientRequest::RequestData { filestem, gtid }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_register_with_type() {
        let req = parse_line("REGISTER UUID=123e4567-e89b-12d3-a456-426614174000, TYPE=JSON");
        assert_eq!(
            req,
            ClientRequest::Register {
                uuid: "123e4567-e89b-12d3-a456-426614174000".to_string(),
                format: Format::Json,
            }
        );
    }

    #[test]
    fn parses_request_data_with_gtid() {
        let req = parse_line("REQUEST-DATA d.t 0-1-5");
        assert_eq!(
            req,
            ClientRequest::RequestData {
                filestem: "d.t".to_string(),
                gtid: Some(Gtid::parse("0-1-5").unwrap()),
            }
        );
    }

    #[test]
    fn unrecognized_command_is_echoed() {
        let req = parse_line("PING");
        assert_eq!(req, ClientRequest::Unknown("PING".to_string()));
    }

    #[test]
    fn malformed_register_falls_back_to_unknown() {
        let req = parse_line("REGISTER nonsense");
        assert!(matches!(req, ClientRequest::Unknown(_)));
    }
}
