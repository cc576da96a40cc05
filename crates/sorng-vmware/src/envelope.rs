//! SOAP 1.1 envelope codec for the vim25 endpoint.
//!
//! `encode` wraps a request fragment in the fixed outer envelope, `decode`
//! turns a raw body into an [`XmlNode`] tree and pulls out any fault
//! marker. Neither function fails; a body that cannot be parsed decodes to
//! an empty tree with a [`FaultOrigin::Malformed`] fault.

use crate::xml::XmlNode;
use std::borrow::Cow;

// ─── Constants ───────────────────────────────────────────────────────

pub const NS_SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const NS_VIM25: &str = "urn:vim25";

const FALLBACK_FAULT_TEXT: &str = "Unknown SOAP fault";

/// Where a fault indicator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// The server embedded a SOAP fault in the body.
    Remote,
    /// The body could not be parsed; the fault text is synthetic.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub origin: FaultOrigin,
    pub text: String,
}

/// Result of decoding a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub tree: XmlNode,
    pub fault: Option<Fault>,
}

impl Decoded {
    pub fn is_malformed(&self) -> bool {
        matches!(self.fault, Some(Fault { origin: FaultOrigin::Malformed, .. }))
    }

    pub fn remote_fault(&self) -> Option<&str> {
        match &self.fault {
            Some(Fault { origin: FaultOrigin::Remote, text }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The SOAP `Body` element, or the whole tree if there is none.
    pub fn body(&self) -> &XmlNode {
        self.tree.find_first(|n| n.is("Body")).unwrap_or(&self.tree)
    }
}

/// Wrap a vim25 request fragment in the SOAP envelope.
pub fn encode(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="{NS_SOAP_ENV}" xmlns:vim25="{NS_VIM25}"><soapenv:Body>{inner}</soapenv:Body></soapenv:Envelope>"#
    )
}

/// Parse a response body and detect an embedded fault anywhere in it.
pub fn decode(body: &str) -> Decoded {
    match XmlNode::parse(body) {
        Ok(tree) => {
            let fault = find_fault(&tree).map(|text| Fault {
                origin: FaultOrigin::Remote,
                text,
            });
            Decoded { tree, fault }
        }
        Err(e) => Decoded {
            tree: XmlNode::empty_document(),
            fault: Some(Fault {
                origin: FaultOrigin::Malformed,
                text: format!("Malformed response: {e}"),
            }),
        },
    }
}

/// Escape text for inclusion in a request body.
pub fn escape(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

fn find_fault(tree: &XmlNode) -> Option<String> {
    if let Some(fs) = tree.find_first(|n| n.is("faultstring")) {
        let text = fs.text_content();
        return Some(if text.is_empty() {
            FALLBACK_FAULT_TEXT.to_string()
        } else {
            text
        });
    }
    // Only a Fault directly under Body. A `fault` under `missingSet` is a
    // per-property read failure, not a failed request.
    let fault = tree.find_first(|n| n.is("Body"))?.child("Fault")?;
    // vim25 puts the typed fault under <detail>; report its type name.
    let detail_type = fault
        .find_first(|n| n.is("detail"))
        .and_then(|d| d.children.first())
        .map(|c| c.xsi_type().unwrap_or(c.name.as_str()).to_string());
    Some(detail_type.unwrap_or_else(|| FALLBACK_FAULT_TEXT.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wraps_fragment_in_envelope() {
        let wire = encode("<vim25:Logout/>");
        assert!(wire.starts_with("<?xml"));
        assert!(wire.contains(r#"xmlns:vim25="urn:vim25""#));
        assert!(wire.contains("<soapenv:Body><vim25:Logout/></soapenv:Body>"));
        assert!(!decode(&wire).is_malformed());
    }

    #[test]
    fn decode_detects_faultstring_anywhere() {
        let body = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body>
            <soapenv:Fault><faultcode>ServerFaultCode</faultcode>
            <faultstring>Cannot complete login due to an incorrect user name or password.</faultstring>
            <detail><InvalidLoginFault xmlns="urn:vim25" xsi:type="InvalidLogin" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/></detail>
            </soapenv:Fault></soapenv:Body></soapenv:Envelope>"#;
        let d = decode(body);
        assert_eq!(
            d.remote_fault(),
            Some("Cannot complete login due to an incorrect user name or password.")
        );
        assert!(!d.is_malformed());
    }

    #[test]
    fn fault_without_faultstring_reports_detail_type() {
        let body = r#"<Envelope><Body><Fault><detail><NotAuthenticatedFault xsi:type="NotAuthenticated" xmlns:xsi="x"/></detail></Fault></Body></Envelope>"#;
        assert_eq!(decode(body).remote_fault(), Some("NotAuthenticated"));
    }

    #[test]
    fn missing_set_fault_is_not_a_request_fault() {
        let body = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><soapenv:Body><RetrievePropertiesResponse xmlns="urn:vim25"><returnval><obj type="VirtualMachine">2</obj><missingSet><path>snapshot</path><fault><fault xsi:type="NoPermission"/><localizedMessage></localizedMessage></fault></missingSet></returnval></RetrievePropertiesResponse></soapenv:Body></soapenv:Envelope>"#;
        let d = decode(body);
        assert!(d.fault.is_none());
        assert!(d.remote_fault().is_none());
    }

    #[test]
    fn empty_faultstring_still_counts() {
        let d = decode("<Envelope><Body><faultstring/></Body></Envelope>");
        assert_eq!(d.remote_fault(), Some(FALLBACK_FAULT_TEXT));
    }

    #[test]
    fn malformed_body_yields_synthetic_fault() {
        let d = decode("<html><body>Service Unavailable");
        assert!(d.is_malformed());
        assert!(d.remote_fault().is_none());
        assert!(d.tree.children.is_empty());
        assert!(d.fault.unwrap().text.starts_with("Malformed response"));
    }

    #[test]
    fn body_falls_back_to_tree() {
        let d = decode("<returnval><key>abc</key></returnval>");
        assert!(d.fault.is_none());
        assert_eq!(d.body().name, crate::xml::DOCUMENT_NODE);

        let d = decode(&encode("<x>1</x>"));
        assert!(d.body().is("Body"));
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape("a<b&c"), "a&lt;b&amp;c");
    }
}
