//! SessionManager login / logout.

use crate::envelope::escape;
use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};
use crate::types::{ObjectReference, Session};
use crate::vsphere::VsphereClient;

use log::{debug, info};

/// Session operations against one SessionManager object.
pub struct SessionManager<'a> {
    client: &'a VsphereClient,
    manager: ObjectReference,
}

impl<'a> SessionManager<'a> {
    pub fn new(client: &'a VsphereClient, manager: ObjectReference) -> Self {
        Self { client, manager }
    }

    /// Log in and return the server-issued session.
    ///
    /// Empty credentials are rejected before anything is sent. A fault, a
    /// malformed reply, a missing key and HTTP 401/403 all surface as
    /// `AuthenticationError`; transport failures and other statuses keep
    /// their own kind.
    pub async fn login(&self, username: &str, password: &str) -> VmwareResult<Session> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(VmwareError::auth("Username and password must not be empty"));
        }

        let fragment = format!(
            r#"<vim25:Login>{}<vim25:userName>{}</vim25:userName><vim25:password>{}</vim25:password></vim25:Login>"#,
            this_element(&self.manager),
            escape(username),
            escape(password),
        );

        let decoded = self
            .client
            .invoke("Login", &fragment)
            .await
            .map_err(login_error)?;

        let body = decoded.body();
        let returnval = body.find_first(|n| n.is("returnval"));
        let key = returnval
            .and_then(|r| r.child_text("key"))
            .or_else(|| body.find_first(|n| n.is("key")).map(|k| k.text.as_str()))
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VmwareError::auth("Login response did not contain a session key"))?;

        let mut session = Session::new(key);
        if let Some(rv) = returnval {
            session.user_name = rv.child_text("userName").map(str::to_string);
            session.login_time = rv.child_text("loginTime").map(str::to_string);
        }

        info!(
            "Logged in to {} as {} (session {})",
            self.client.endpoint(),
            session.user_name.as_deref().unwrap_or(username),
            session.masked_key()
        );
        Ok(session)
    }

    /// Close the session. Consumes it so it cannot be reused.
    pub async fn logout(&self, session: Session) -> VmwareResult<()> {
        let fragment = format!(
            "<vim25:Logout>{}</vim25:Logout>",
            this_element(&self.manager)
        );
        self.client.invoke("Logout", &fragment).await?;
        debug!("Logged out session {}", session.masked_key());
        Ok(())
    }
}

/// `_this` element addressing a managed object.
pub(crate) fn this_element(obj: &ObjectReference) -> String {
    format!(
        r#"<vim25:_this type="{}">{}</vim25:_this>"#,
        escape(&obj.kind),
        escape(&obj.value)
    )
}

fn login_error(e: VmwareError) -> VmwareError {
    match e.kind {
        VmwareErrorKind::ProtocolFault | VmwareErrorKind::MalformedResponse => {
            VmwareError::auth(e.message)
        }
        VmwareErrorKind::UnexpectedStatus(code @ (401 | 403)) => {
            VmwareError::auth(format!("Login rejected with HTTP {code}"))
        }
        _ => e,
    }
}
