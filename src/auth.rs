use crate::error::{HandshakeError, ProtocolError};
use crate::protocol::{AuthMethod, AuthStatus, USERPASS_VERSION};
use crate::reader::ExactReader;
use tokio::io::{AsyncRead, AsyncWrite};

/// UserPass holds username/password credentials as dictated
/// server-side
#[derive(Clone, Debug, PartialEq)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

/// UserPass implementation block
impl UserPass {
    /// matches compares the client's credentials byte for byte
    pub fn matches(&self, username: &[u8], password: &[u8]) -> bool {
        self.username.as_bytes() == username && self.password.as_bytes() == password
    }
}

/// select_auth_method takes the auth methods offered by the socks client
/// and returns the method the server will use.
///
/// Username/password is mandatory: it wins even when no-auth is also
/// offered, and a client that does not offer it gets NoAcceptable.
pub fn select_auth_method(client_methods: &[u8]) -> AuthMethod {
    // Preferred auth method order
    const PREFERRED_METHODS: &[AuthMethod] = &[AuthMethod::UserPass];

    // Iterate through preferences in order. If there's a match
    // return it
    for &preferred in PREFERRED_METHODS {
        if client_methods.contains(&(preferred as u8)) {
            return preferred;
        }
    }

    AuthMethod::NoAcceptable
}

/// authenticate_userpass handles username/password authentication according to RFC 1929
pub async fn authenticate_userpass<S>(
    reader: &mut ExactReader<S>,
    server_creds: &UserPass,
) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Client Username/Password Request
    // +----+------+----------+------+----------+
    // |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    // +----+------+----------+------+----------+
    // | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    // +----+------+----------+------+----------+
    let [version, username_len] = reader.read_array::<2>().await?;
    if version != USERPASS_VERSION {
        return Err(ProtocolError::AuthVersion(version).into());
    }

    let username = reader.read_exact(username_len as usize).await?;
    let password_len = reader.read_u8().await?;
    let password = reader.read_exact(password_len as usize).await?;

    let status = if server_creds.matches(&username, &password) {
        AuthStatus::Success
    } else {
        AuthStatus::Failure
    };

    // Username/Password Server response
    // +----+--------+
    // |VER | STATUS |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+
    reader.reply(&[USERPASS_VERSION, status as u8]).await?;

    match status {
        AuthStatus::Success => Ok(()),
        AuthStatus::Failure => Err(HandshakeError::AuthFailed),
    }
}
