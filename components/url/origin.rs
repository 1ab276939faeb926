/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use serde::{Deserialize, Serialize};
use url::{Host, Origin};
use uuid::Uuid;

/// The origin of a URL.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ImmutableOrigin {
    /// A globally unique identifier
    Opaque(OpaqueOrigin),

    /// Consists of the URL's scheme, host and port
    Tuple(String, Host, u16),
}

impl ImmutableOrigin {
    pub fn new(origin: Origin) -> ImmutableOrigin {
        match origin {
            Origin::Opaque(_) => ImmutableOrigin::new_opaque(),
            Origin::Tuple(scheme, host, port) => ImmutableOrigin::Tuple(scheme, host, port),
        }
    }

    /// Creates a new opaque origin that is only equal to itself.
    pub fn new_opaque() -> ImmutableOrigin {
        ImmutableOrigin::Opaque(OpaqueOrigin(Uuid::new_v4()))
    }

    pub fn scheme(&self) -> Option<&str> {
        match *self {
            ImmutableOrigin::Opaque(_) => None,
            ImmutableOrigin::Tuple(ref scheme, _, _) => Some(&**scheme),
        }
    }

    pub fn host(&self) -> Option<&Host> {
        match *self {
            ImmutableOrigin::Opaque(_) => None,
            ImmutableOrigin::Tuple(_, ref host, _) => Some(host),
        }
    }

    pub fn port(&self) -> Option<u16> {
        match *self {
            ImmutableOrigin::Opaque(_) => None,
            ImmutableOrigin::Tuple(_, _, port) => Some(port),
        }
    }

    /// The origin's port, or `None` when it is the scheme's default port.
    /// `url::Origin::Tuple` always carries a concrete port, so callers that
    /// want `http://foo.com` rather than `http://foo.com:80` go through this.
    pub fn port_unless_default(&self) -> Option<u16> {
        match *self {
            ImmutableOrigin::Opaque(_) => None,
            ImmutableOrigin::Tuple(ref scheme, _, port) => {
                (port != default_port_for_scheme(scheme)).then_some(port)
            },
        }
    }

    /// Return whether this origin is a (scheme, host, port) tuple
    /// (as opposed to an opaque origin).
    pub fn is_tuple(&self) -> bool {
        match *self {
            ImmutableOrigin::Opaque(..) => false,
            ImmutableOrigin::Tuple(..) => true,
        }
    }

    /// The registrable domain (eTLD+1) of this origin's host, per the public
    /// suffix list. IP addresses and hosts without a known suffix (for
    /// example `localhost`) fall back to the full host.
    pub fn registrable_domain(&self) -> Option<String> {
        match self.host()? {
            Host::Domain(domain) => Some(
                psl::domain_str(domain)
                    .unwrap_or(domain.as_str())
                    .to_owned(),
            ),
            host => Some(host.to_string()),
        }
    }

    /// Whether this origin's host equals `other`'s host or is a subdomain of
    /// it, with matching schemes. Ports are deliberately ignored: isolation
    /// declarations match all ports of a host.
    pub fn is_same_or_subdomain_of(&self, other: &ImmutableOrigin) -> bool {
        let (Some(scheme), Some(other_scheme)) = (self.scheme(), other.scheme()) else {
            return false;
        };
        if scheme != other_scheme {
            return false;
        }
        match (self.host(), other.host()) {
            (Some(Host::Domain(host)), Some(Host::Domain(other_host))) => {
                host == other_host ||
                    (host.len() > other_host.len() &&
                        host.ends_with(other_host.as_str()) &&
                        host.as_bytes()[host.len() - other_host.len() - 1] == b'.')
            },
            (Some(host), Some(other_host)) => host == other_host,
            _ => false,
        }
    }

    /// <https://html.spec.whatwg.org/multipage/#ascii-serialisation-of-an-origin>
    pub fn ascii_serialization(&self) -> String {
        match *self {
            ImmutableOrigin::Opaque(_) => "null".to_owned(),
            ImmutableOrigin::Tuple(ref scheme, ref host, _) => match self.port_unless_default() {
                Some(port) => format!("{}://{}:{}", scheme, host, port),
                None => format!("{}://{}", scheme, host),
            },
        }
    }
}

impl fmt::Display for ImmutableOrigin {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.ascii_serialization())
    }
}

fn default_port_for_scheme(scheme: &str) -> u16 {
    match scheme {
        "http" | "ws" => 80,
        "https" | "wss" => 443,
        "ftp" => 21,
        _ => 0,
    }
}

/// Opaque identifier for URLs that have file or other schemes
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct OpaqueOrigin(Uuid);
