use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::DocsError;
use crate::types::tree::{ChildDescriptor, TopLevelDescriptor};

/// Structural kind of a documentation entry.
///
/// Top-level symbols are keyed by name alone. Child symbols join the parent name
/// and their own name with a connector that differs per kind, so a method and a
/// member sharing a name never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSymbol {
    Class,
    Typedef,
    Method,
    Member,
    Event,
}

impl TypeSymbol {
    pub const TOP_LEVEL: [TypeSymbol; 2] = [TypeSymbol::Class, TypeSymbol::Typedef];

    /// Key connector, `None` for top-level symbols.
    pub fn connector(self) -> Option<char> {
        ChildRole::for_symbol(self).map(|role| role.connector)
    }

    pub fn is_top_level(self) -> bool {
        self.connector().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeSymbol::Class => "class",
            TypeSymbol::Typedef => "typedef",
            TypeSymbol::Method => "method",
            TypeSymbol::Member => "member",
            TypeSymbol::Event => "event",
        }
    }

    /// Reverse lookup from a connector found inside a composite key.
    pub fn from_connector(connector: char) -> Option<TypeSymbol> {
        ChildRole::ALL
            .into_iter()
            .find(|role| role.connector == connector)
            .map(|role| role.symbol)
    }
}

impl fmt::Display for TypeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeSymbol {
    type Err = DocsError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind.to_ascii_lowercase().as_str() {
            "class" => Ok(TypeSymbol::Class),
            "typedef" => Ok(TypeSymbol::Typedef),
            "method" => Ok(TypeSymbol::Method),
            "member" | "prop" => Ok(TypeSymbol::Member),
            "event" => Ok(TypeSymbol::Event),
            other => Err(DocsError::build(other, "unknown descriptor kind")),
        }
    }
}

/// One child sequence of a top-level descriptor: the symbol its entries get,
/// the tree field holding them and the key connector.
#[derive(Debug, Clone, Copy)]
pub struct ChildRole {
    pub symbol: TypeSymbol,
    pub field: &'static str,
    pub connector: char,
    accessor: fn(&TopLevelDescriptor) -> Option<&[Arc<ChildDescriptor>]>,
}

fn methods_of(d: &TopLevelDescriptor) -> Option<&[Arc<ChildDescriptor>]> {
    d.methods.as_deref()
}

fn props_of(d: &TopLevelDescriptor) -> Option<&[Arc<ChildDescriptor>]> {
    d.props.as_deref()
}

fn events_of(d: &TopLevelDescriptor) -> Option<&[Arc<ChildDescriptor>]> {
    d.events.as_deref()
}

impl ChildRole {
    /// Iterated in this order by the index builder.
    pub const ALL: [ChildRole; 3] = [
        ChildRole {
            symbol: TypeSymbol::Method,
            field: "methods",
            connector: '#',
            accessor: methods_of,
        },
        ChildRole {
            symbol: TypeSymbol::Member,
            field: "props",
            connector: '~',
            accessor: props_of,
        },
        ChildRole {
            symbol: TypeSymbol::Event,
            field: "events",
            connector: '$',
            accessor: events_of,
        },
    ];

    pub fn for_symbol(symbol: TypeSymbol) -> Option<ChildRole> {
        Self::ALL.into_iter().find(|role| role.symbol == symbol)
    }

    /// Children of `parent` under this role; empty when the role is absent.
    pub fn children<'a>(&self, parent: &'a TopLevelDescriptor) -> &'a [Arc<ChildDescriptor>] {
        (self.accessor)(parent).unwrap_or(&[])
    }
}

/// Join the non-empty path segments of an entry with `connector`.
pub fn join_key<S: AsRef<str>>(segments: &[S], connector: char) -> String {
    let mut key = String::new();
    for segment in segments.iter().map(AsRef::as_ref).filter(|s| !s.is_empty()) {
        if !key.is_empty() {
            key.push(connector);
        }
        key.push_str(segment);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectors_are_distinct() {
        let connectors: Vec<char> = ChildRole::ALL.iter().map(|r| r.connector).collect();
        assert_eq!(connectors, vec!['#', '~', '$']);
        assert_eq!(TypeSymbol::Method.connector(), Some('#'));
        assert_eq!(TypeSymbol::Class.connector(), None);
        for symbol in TypeSymbol::TOP_LEVEL {
            assert!(symbol.is_top_level());
        }
    }

    #[test]
    fn test_symbol_from_kind() {
        assert_eq!("class".parse::<TypeSymbol>().unwrap(), TypeSymbol::Class);
        assert_eq!("Typedef".parse::<TypeSymbol>().unwrap(), TypeSymbol::Typedef);
        assert_eq!("prop".parse::<TypeSymbol>().unwrap(), TypeSymbol::Member);
        assert_eq!("member".parse::<TypeSymbol>().unwrap(), TypeSymbol::Member);
        assert_eq!("EVENT".parse::<TypeSymbol>().unwrap(), TypeSymbol::Event);

        let err = "interface".parse::<TypeSymbol>().unwrap_err();
        assert!(err.is_build());
    }

    #[test]
    fn test_from_connector() {
        assert_eq!(TypeSymbol::from_connector('#'), Some(TypeSymbol::Method));
        assert_eq!(TypeSymbol::from_connector('~'), Some(TypeSymbol::Member));
        assert_eq!(TypeSymbol::from_connector('$'), Some(TypeSymbol::Event));
        assert_eq!(TypeSymbol::from_connector('.'), None);
    }

    #[test]
    fn test_join_key_skips_empty_segments() {
        assert_eq!(join_key(&["Foo", "bar"], '#'), "Foo#bar");
        assert_eq!(join_key(&["Foo", ""], '#'), "Foo");
        assert_eq!(join_key(&["", "bar"], '~'), "bar");
        assert_eq!(join_key::<&str>(&[], '$'), "");
    }
}
