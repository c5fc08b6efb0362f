use tracing::{debug, info};
use tsmunin_sdk::{Connector, QueryError, QuerySession};

use crate::config::Credentials;

/// An authenticated session that is closed when dropped, whatever happened
/// while it was in use.
pub struct SessionGuard {
    session: Box<dyn QuerySession>,
}

impl SessionGuard {
    pub fn open<C: Connector + ?Sized>(
        connector: &C,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<Self, QueryError> {
        let mut guard = Self {
            session: connector.connect(host, port)?,
        };
        guard
            .session()
            .authenticate(&credentials.username, &credentials.password)?;
        info!(host, port, user = %credentials.username, "serverquery session established");
        Ok(guard)
    }

    pub fn session(&mut self) -> &mut dyn QuerySession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(error) = self.session.close() {
            debug!(%error, "closing serverquery session failed");
        }
    }
}
