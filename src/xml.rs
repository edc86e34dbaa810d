// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal XML attribute extraction for upstream reply correlation.
//!
//! Upstream replies are `<?xml ...?><response resource="..." action="..."
//! identifier="..."/>`-shaped documents. We only need the three correlation
//! attributes off the root element, so a full DOM isn't worth building —
//! `quick_xml`'s pull reader is enough to find the first start/empty tag.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// The three correlation attributes read off an upstream reply's root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAttrs {
    pub resource: Option<String>,
    pub action: Option<String>,
    pub identifier: Option<String>,
}

/// Parse `text` as XML and pull `resource`/`action`/`identifier` off the root
/// element. Returns `None` if the document doesn't parse or has no root
/// element with attributes.
pub fn parse_reply_attrs(text: &str) -> Option<ReplyAttrs> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                let mut attrs = ReplyAttrs { resource: None, action: None, identifier: None };
                for attr in tag.attributes().flatten() {
                    let key = attr.key.as_ref();
                    let Ok(value) = attr.decode_and_unescape_value(reader.decoder()) else {
                        continue;
                    };
                    match key {
                        b"resource" => attrs.resource = Some(value.into_owned()),
                        b"action" => attrs.action = Some(value.into_owned()),
                        b"identifier" => attrs.identifier = Some(value.into_owned()),
                        _ => {}
                    }
                }
                return Some(attrs);
            }
            Ok(Event::Eof) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
