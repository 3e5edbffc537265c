use super::{Packet, PROTOCOL_VERSION};
use crate::error::{LoginError, ProtocolError};
use crate::game::GameHandle;
use crate::prelude::*;
use std::io::{Read, Write};
use std::net::TcpStream;

/// How long a client gets to finish logging in.
const LOGIN_TIMEOUT: time::Duration = time::Duration::from_secs(30);

fn expect_handshake(pkt: Packet) -> Result<String, LoginError> {
    match pkt {
        Packet::Handshake { username_or_hash } => Ok(username_or_hash),
        other => Err(ProtocolError::Unexpected(other.name()).into()),
    }
}
fn expect_login(pkt: Packet) -> Result<(i32, String), LoginError> {
    match pkt {
        Packet::Login { version_or_entity, username, .. } => Ok((version_or_entity, username)),
        other => Err(ProtocolError::Unexpected(other.name()).into()),
    }
}

/// Runs the pre-play exchange and returns the name the client logged in
/// with. Reads one packet at a time straight off `conn` so nothing sent after
/// the login is consumed here.
pub fn login(conn: &mut (impl Read + Write)) -> Result<Name, LoginError> {
    let claimed = expect_handshake(Packet::read(conn)?)?;
    // "-" means no authentication
    send(conn, &Packet::Handshake { username_or_hash: "-".to_owned() })?;
    let (version, username) = expect_login(Packet::read(conn)?)?;
    if version != PROTOCOL_VERSION {
        return Err(LoginError::Version(version));
    }
    if username != claimed {
        return Err(LoginError::NameMismatch { handshake: claimed, login: username });
    }
    Name::from_username(&username).ok_or(LoginError::Username(username))
}

fn send(conn: &mut impl Write, packet: &Packet) -> Result<(), ProtocolError> {
    conn.write_all(&packet.to_bytes())?;
    Ok(conn.flush()?)
}

/// What the client is told when its login is refused.
fn refusal(err: &LoginError) -> Option<String> {
    match err {
        LoginError::Version(v) if *v < PROTOCOL_VERSION => Some("Outdated client!".to_owned()),
        LoginError::Version(_) => Some("Outdated server!".to_owned()),
        LoginError::Username(_) | LoginError::NameMismatch { .. } => Some("Invalid username".to_owned()),
        LoginError::Protocol(_) => None,
    }
}

fn negotiate(conn: &mut TcpStream) -> Result<Name, LoginError> {
    conn.set_read_timeout(Some(LOGIN_TIMEOUT)).map_err(ProtocolError::from)?;
    let name = login(conn)?;
    conn.set_read_timeout(None).map_err(ProtocolError::from)?;
    Ok(name)
}

/// Logs `conn` in and hands it to the game.
pub(super) fn admit(mut conn: TcpStream, game: &GameHandle) {
    let peer = conn.peer_addr().map_or_else(|_| "unknown peer".to_owned(), |a| a.to_string());
    let name = match negotiate(&mut conn) {
        Ok(name) => name,
        Err(e) => return refuse(conn, &peer, e),
    };
    log::debug!("{peer} logged in as {name}");
    let joining = game.clone();
    if game.enqueue(move |g| g.join(conn, name, joining)).is_err() {
        // the rejected task took the connection with it
        log::warn!("{peer} arrived while the server was shutting down");
    }
}

fn refuse(mut conn: impl Write, peer: &str, err: LoginError) {
    match &err {
        LoginError::Protocol(e) if e.is_end_of_stream() => log::debug!("{peer} left during login"),
        LoginError::Protocol(e) => log::warn!("{peer} failed to log in: {e}"),
        e => log::info!("refused {peer}: {e}"),
    }
    if let Some(reason) = refusal(&err) {
        if let Err(e) = send(&mut conn, &Packet::Disconnect { reason }) {
            log::debug!("unable to tell {peer} why: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted client input, with everything the server writes captured.
    struct Pipe {
        input: std::io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }
    impl Pipe {
        fn new(packets: &[Packet]) -> Self {
            let mut input = vec![];
            for p in packets {
                p.write(&mut input);
            }
            Self { input: std::io::Cursor::new(input), output: vec![] }
        }
    }
    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }
    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn hello(name: &str) -> Packet {
        Packet::Handshake { username_or_hash: name.into() }
    }
    fn login_as(name: &str, version: i32) -> Packet {
        Packet::Login { version_or_entity: version, username: name.into(), map_seed: 0, dimension: 0 }
    }

    #[test]
    fn handshake_then_login() {
        let mut pipe = Pipe::new(&[hello("alex"), login_as("alex", PROTOCOL_VERSION), Packet::chat("hi")]);
        assert_eq!(login(&mut pipe).unwrap().as_str(), "alex");
        assert_eq!(Packet::read(&mut &pipe.output[..]).unwrap(), hello("-"));
        assert_eq!(Packet::read(&mut pipe).unwrap(), Packet::chat("hi"));
    }

    #[test]
    fn wrong_version_is_refused() {
        let mut pipe = Pipe::new(&[hello("alex"), login_as("alex", 13)]);
        let err = login(&mut pipe).unwrap_err();
        assert!(matches!(err, LoginError::Version(13)));
        assert_eq!(refusal(&err).as_deref(), Some("Outdated client!"));
    }

    #[test]
    fn names_are_checked() {
        let mut pipe = Pipe::new(&[hello("alex"), login_as("steve", PROTOCOL_VERSION)]);
        assert!(matches!(login(&mut pipe), Err(LoginError::NameMismatch { .. })));
        let mut pipe = Pipe::new(&[hello("a b"), login_as("a b", PROTOCOL_VERSION)]);
        assert!(matches!(login(&mut pipe), Err(LoginError::Username(_))));
    }

    struct Hungup;
    impl Write for Hungup {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn refusals_carry_the_reason() {
        let mut out = vec![];
        refuse(&mut out, "peer", LoginError::Version(15));
        assert_eq!(Packet::read(&mut &out[..]).unwrap(), Packet::Disconnect { reason: "Outdated server!".into() });

        let mut out = vec![];
        refuse(&mut out, "peer", ProtocolError::EndOfStream.into());
        assert!(out.is_empty());

        refuse(Hungup, "peer", LoginError::Username("a b".into()));
    }

    #[test]
    fn login_must_start_with_a_handshake() {
        let mut pipe = Pipe::new(&[login_as("alex", PROTOCOL_VERSION)]);
        let err = login(&mut pipe).unwrap_err();
        assert!(matches!(err, LoginError::Protocol(ProtocolError::Unexpected("Login"))));
        assert_eq!(refusal(&err), None);
    }
}
