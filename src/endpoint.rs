// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL-to-triple parsing and wildcard matching shared by the ACL, the
//! response cache, and upstream reply correlation.

use std::fmt;

/// A parsed `/resource/action/identifier/sub_command` URL.
///
/// Construction is immutable: both `Endpoint::parse` and `Endpoint::from_parts`
/// produce a value whose fields never change afterward.
///
/// Equality and hashing are by the `(resource, action, identifier,
/// sub_command)` tuple only — the `url` field is not part of identity, so two
/// endpoints built from differently-formatted URLs that resolve to the same
/// tuple are the same key.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: String,
    resource: Option<String>,
    action: Option<String>,
    identifier: Option<String>,
    sub_command: Option<String>,
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.action == other.action
            && self.identifier == other.identifier
            && self.sub_command == other.sub_command
    }
}

impl Eq for Endpoint {}

impl std::hash::Hash for Endpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
        self.action.hash(state);
        self.identifier.hash(state);
        self.sub_command.hash(state);
    }
}

impl Endpoint {
    /// Parse a URL path into an endpoint. Strips one leading `/`, splits on
    /// `/`, and takes the first four segments, padding absent trailing ones.
    pub fn parse(url: &str) -> Self {
        let stripped = url.strip_prefix('/').unwrap_or(url);
        let mut parts = stripped.split('/').map(|s| s.to_owned());

        Self {
            url: url.to_owned(),
            resource: parts.next().filter(|s| !s.is_empty()),
            action: parts.next(),
            identifier: parts.next(),
            sub_command: parts.next(),
        }
    }

    /// Construct an endpoint from its parts, omitting a `/`-prefixed segment
    /// for any tail that is absent (the inverse of `parse` for well-formed
    /// inputs where every leading segment up to the last present one exists).
    pub fn from_parts(
        resource: Option<&str>,
        action: Option<&str>,
        identifier: Option<&str>,
        sub_command: Option<&str>,
    ) -> Self {
        let mut url = String::new();
        if let Some(r) = resource {
            url.push('/');
            url.push_str(r);
        }
        if let Some(a) = action {
            url.push('/');
            url.push_str(a);
        }
        if let Some(i) = identifier {
            url.push('/');
            url.push_str(i);
        }
        if let Some(s) = sub_command {
            url.push('/');
            url.push_str(s);
        }

        Self {
            url,
            resource: resource.map(str::to_owned),
            action: action.map(str::to_owned),
            identifier: identifier.map(str::to_owned),
            sub_command: sub_command.map(str::to_owned),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.sub_command.as_deref()
    }

    /// True iff this endpoint is expected to carry a binary (image) reply:
    /// `presentation/slide/{*,preview,image}`.
    pub fn expect_binary(&self) -> bool {
        self.resource.as_deref() == Some("presentation")
            && self.action.as_deref() == Some("slide")
            && matches!(self.sub_command.as_deref(), Some("preview") | Some("image"))
    }

    /// Wildcard match, treating `self` as the stored pattern and `probe` as
    /// the incoming value. Resource must match exactly; action and identifier
    /// match exactly, or match via `"*"`/`""` on the pattern side when the
    /// probe supplies a concrete, non-empty value (an absent pattern field is
    /// not itself a wildcard).
    pub fn matches(&self, probe: &Triple<'_>) -> bool {
        if self.resource.as_deref() != Some(probe.resource) {
            return false;
        }

        field_matches(self.action.as_deref(), probe.action)
            && field_matches(self.identifier.as_deref(), probe.identifier)
    }

    /// Convenience wrapper: parse `url` and match it as a probe triple.
    pub fn matches_url(&self, url: &str) -> bool {
        let probe = Endpoint::parse(url);
        self.matches(&Triple {
            resource: probe.resource.as_deref().unwrap_or(""),
            action: probe.action.as_deref(),
            identifier: probe.identifier.as_deref(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A borrowed `(resource, action, identifier)` probe, used to test against a
/// stored `Endpoint` pattern without allocating.
#[derive(Debug, Clone, Copy)]
pub struct Triple<'a> {
    pub resource: &'a str,
    pub action: Option<&'a str>,
    pub identifier: Option<&'a str>,
}

/// Pattern-side wildcard semantics: the pattern field matches the probe field
/// if they're equal (including both absent), or if the probe supplies a
/// concrete non-empty value and the pattern is the literal string `"*"` or
/// `""`. An absent pattern field is NOT a wildcard — it requires the probe to
/// be absent too. A wildcard pattern never matches an absent probe field.
fn field_matches(pattern: Option<&str>, probe: Option<&str>) -> bool {
    if pattern == probe {
        return true;
    }
    matches!(pattern, Some("") | Some("*")) && matches!(probe, Some(p) if !p.is_empty())
}
