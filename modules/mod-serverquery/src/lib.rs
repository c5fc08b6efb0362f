//! Blocking TeamSpeak 3 ServerQuery client.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};
use tsmunin_sdk::{
    Connector, InstanceId, QueryError, QuerySession, ServerStats, VirtualServer,
};

pub mod codec;

use codec::{Record, escape, lookup, parse_records, parse_status};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const GREETING: &str = "TS3";

/// Opens TCP sessions against a ServerQuery port.
#[derive(Debug, Clone, Copy)]
pub struct ServerQueryConnector {
    timeout: Duration,
}

impl ServerQueryConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ServerQueryConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Connector for ServerQueryConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn QuerySession>, QueryError> {
        let address = format!("{}:{}", host, port);
        debug!(%address, "connecting to serverquery");

        let stream =
            open_stream(&address, self.timeout).map_err(|source| QueryError::Connection {
                address: address.clone(),
                source,
            })?;
        let reader = BufReader::new(stream.try_clone()?);
        let client = ServerQueryClient::handshake(reader, stream)?;
        Ok(Box::new(client))
    }
}

fn open_stream(address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

/// One ServerQuery conversation over any line-oriented byte stream.
pub struct ServerQueryClient<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> ServerQueryClient<R, W> {
    /// Consumes the greeting banner and welcome text.
    pub fn handshake(reader: R, writer: W) -> Result<Self, QueryError> {
        let mut client = Self { reader, writer };

        let banner = client.next_line()?;
        if banner != GREETING {
            return Err(QueryError::Protocol(format!(
                "expected `{}` greeting, got `{}`",
                GREETING, banner
            )));
        }
        let welcome = client.next_line()?;
        trace!(%welcome, "serverquery greeting");

        Ok(client)
    }

    /// Next non-blank line. The server terminates lines with `\n\r`.
    fn next_line(&mut self) -> Result<String, QueryError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(QueryError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }

            let line = line.trim_matches(|c: char| c == '\r' || c == '\n');
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }

    fn execute(&mut self, command: &str) -> Result<Vec<Record>, QueryError> {
        let name = command.split(' ').next().unwrap_or(command);
        debug!(command = name, "sending serverquery command");

        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut records = Vec::new();
        loop {
            let line = self.next_line()?;
            match parse_status(&line)? {
                Some(status) if status.is_ok() => return Ok(records),
                Some(status) => {
                    return Err(QueryError::Command {
                        command: name.to_string(),
                        id: status.id,
                        message: status.message,
                    });
                }
                None => records.extend(parse_records(&line)),
            }
        }
    }
}

impl<R: BufRead, W: Write> QuerySession for ServerQueryClient<R, W> {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<(), QueryError> {
        let command = format!(
            "login client_login_name={} client_login_password={}",
            escape(username),
            escape(password)
        );
        match self.execute(&command) {
            Err(QueryError::Command { message, .. }) => Err(QueryError::Auth { message }),
            other => other.map(drop),
        }
    }

    fn select_instance(&mut self, id: InstanceId) -> Result<(), QueryError> {
        self.execute(&format!("use sid={}", id)).map(drop)
    }

    fn instance_info(&mut self) -> Result<ServerStats, QueryError> {
        let record = self
            .execute("serverinfo")?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::Protocol("empty serverinfo response".to_string()))?;
        Ok(record.into_iter().collect())
    }

    fn list_instances(&mut self) -> Result<Vec<VirtualServer>, QueryError> {
        self.execute("serverlist")?
            .iter()
            .map(virtual_server_from_record)
            .collect()
    }

    fn close(&mut self) -> Result<(), QueryError> {
        self.execute("quit").map(drop)
    }
}

fn virtual_server_from_record(record: &Record) -> Result<VirtualServer, QueryError> {
    let raw_id = lookup(record, "virtualserver_id")
        .ok_or_else(|| QueryError::missing("virtualserver_id"))?;
    let id = raw_id.parse::<InstanceId>().map_err(|_| QueryError::InvalidField {
        field: "virtualserver_id".to_string(),
        value: raw_id.to_string(),
    })?;
    let name = lookup(record, "virtualserver_name")
        .unwrap_or_default()
        .to_string();

    Ok(VirtualServer { id, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands.\n\r";

    fn script(responses: &[&str]) -> Vec<u8> {
        let mut out = String::from(BANNER);
        for response in responses {
            out.push_str(response);
            out.push_str("\n\r");
        }
        out.into_bytes()
    }

    fn sid(value: u32) -> InstanceId {
        InstanceId::new(value).expect("non-zero id")
    }

    #[test]
    fn handshake_rejects_foreign_services() {
        let input = b"SSH-2.0-OpenSSH_9.6\r\n".to_vec();
        let mut sent: Vec<u8> = Vec::new();
        let result = ServerQueryClient::handshake(&input[..], &mut sent);
        assert!(matches!(result, Err(QueryError::Protocol(_))));
    }

    #[test]
    fn login_escapes_credentials() {
        let input = script(&["error id=0 msg=ok"]);
        let mut sent: Vec<u8> = Vec::new();
        {
            let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();
            client.authenticate("serveradmin", "p4ss word").unwrap();
        }
        assert_eq!(
            String::from_utf8(sent).unwrap(),
            "login client_login_name=serveradmin client_login_password=p4ss\\sword\n"
        );
    }

    #[test]
    fn rejected_login_maps_to_auth_error() {
        let input = script(&["error id=520 msg=invalid\\sloginname\\sor\\spassword"]);
        let mut sent: Vec<u8> = Vec::new();
        let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();

        let error = client.authenticate("serveradmin", "wrong").unwrap_err();
        assert!(error.is_auth());
        assert_eq!(error.to_string(), "Login failed: invalid loginname or password");
    }

    #[test]
    fn serverinfo_after_use() {
        let input = script(&[
            "error id=0 msg=ok",
            "virtualserver_uptime=3600 virtualserver_clientsonline=12 virtualserver_name=Main\\sRoom",
            "error id=0 msg=ok",
        ]);
        let mut sent: Vec<u8> = Vec::new();
        let stats = {
            let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();
            client.select_instance(sid(3)).unwrap();
            client.instance_info().unwrap()
        };

        assert_eq!(stats.get("virtualserver_uptime"), Some("3600"));
        assert_eq!(stats.get("virtualserver_name"), Some("Main Room"));
        assert_eq!(String::from_utf8(sent).unwrap(), "use sid=3\nserverinfo\n");
    }

    #[test]
    fn failed_command_keeps_server_message() {
        let input = script(&["error id=1024 msg=invalid\\sserverID"]);
        let mut sent: Vec<u8> = Vec::new();
        let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();

        match client.select_instance(sid(99)) {
            Err(QueryError::Command { command, id, message }) => {
                assert_eq!(command, "use");
                assert_eq!(id, 1024);
                assert_eq!(message, "invalid serverID");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn serverlist_yields_names() {
        let input = script(&[
            "virtualserver_id=1 virtualserver_port=9987 virtualserver_name=Lobby|virtualserver_id=2 virtualserver_port=9988 virtualserver_name=Guild\\sHall",
            "error id=0 msg=ok",
        ]);
        let mut sent: Vec<u8> = Vec::new();
        let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();

        let servers = client.list_instances().unwrap();
        assert_eq!(
            servers,
            vec![
                VirtualServer { id: sid(1), name: "Lobby".into() },
                VirtualServer { id: sid(2), name: "Guild Hall".into() },
            ]
        );
    }

    #[test]
    fn truncated_response_is_an_io_error() {
        let input = BANNER.as_bytes().to_vec();
        let mut sent: Vec<u8> = Vec::new();
        let mut client = ServerQueryClient::handshake(&input[..], &mut sent).unwrap();
        assert!(matches!(client.instance_info(), Err(QueryError::Io(_))));
    }
}
