/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

pub mod origin;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
pub use url::Host;
use url::{Position, Url};

pub use crate::origin::{ImmutableOrigin, OpaqueOrigin};

const DATA_URL_DISPLAY_LENGTH: usize = 40;

/// Schemes whose URLs carry a meaningful (scheme, host, port) origin and can
/// therefore be mapped to a site. Everything else (`about:`, `data:`,
/// `blob:` without a standard inner URL, custom schemes) stays siteless.
const STANDARD_SCHEMES: &[&str] = &["http", "https", "ws", "wss", "ftp", "file"];

/// A URL as used by the isolation engine.
///
/// Cheap to clone: the parsed representation is shared behind an `Arc`, since
/// the same URL travels through site computation, process allocation, and the
/// navigation state machine.
#[derive(Clone, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SiteUrl(Arc<Url>);

impl SiteUrl {
    pub fn from_url(url: Url) -> Self {
        SiteUrl(Arc::new(url))
    }

    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self::from_url)
    }

    pub fn parse_with_base(base: Option<&Self>, input: &str) -> Result<Self, url::ParseError> {
        Url::options()
            .base_url(base.map(|base| &*base.0))
            .parse(input)
            .map(Self::from_url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn host_str(&self) -> Option<&str> {
        self.0.host_str()
    }

    pub fn port_or_known_default(&self) -> Option<u16> {
        self.0.port_or_known_default()
    }

    pub fn origin(&self) -> ImmutableOrigin {
        ImmutableOrigin::new(self.0.origin())
    }

    /// Whether this URL's scheme can carry a site at all.
    pub fn has_standard_scheme(&self) -> bool {
        STANDARD_SCHEMES.contains(&self.scheme())
    }

    pub fn is_about_blank(&self) -> bool {
        self.scheme() == "about" && &self.0[Position::BeforePath..] == "blank"
    }

    /// A debug-friendly rendering that truncates `data:` URL payloads.
    pub fn debug_compact(&self) -> impl fmt::Display + '_ {
        struct Compact<'a>(&'a SiteUrl);
        impl fmt::Display for Compact<'_> {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                let url_string = self.0.as_str();
                if self.0.scheme() == "data" && url_string.len() > DATA_URL_DISPLAY_LENGTH {
                    write!(formatter, "{}...", &url_string[..DATA_URL_DISPLAY_LENGTH])
                } else {
                    write!(formatter, "{}", url_string)
                }
            }
        }
        Compact(self)
    }
}

impl fmt::Debug for SiteUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.debug_compact())
    }
}

impl fmt::Display for SiteUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

impl From<Url> for SiteUrl {
    fn from(url: Url) -> Self {
        SiteUrl::from_url(url)
    }
}
