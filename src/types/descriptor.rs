use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::types::symbol::{join_key, TypeSymbol};
use crate::types::tree::{ChildDescriptor, DescriptorMeta, TopLevelDescriptor};

/// Back-reference from a child entry to the top-level descriptor it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    pub name: String,
    pub symbol: TypeSymbol,
}

/// One indexed documentation entry. Cloning only bumps reference counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Descriptor {
    TopLevel {
        symbol: TypeSymbol,
        #[serde(flatten)]
        entry: Arc<TopLevelDescriptor>,
    },
    Child {
        symbol: TypeSymbol,
        parent: ParentRef,
        #[serde(flatten)]
        entry: Arc<ChildDescriptor>,
    },
}

impl Descriptor {
    pub fn top_level(symbol: TypeSymbol, entry: Arc<TopLevelDescriptor>) -> Self {
        Self::TopLevel { symbol, entry }
    }

    pub fn child(
        symbol: TypeSymbol,
        parent: &TopLevelDescriptor,
        parent_symbol: TypeSymbol,
        entry: Arc<ChildDescriptor>,
    ) -> Self {
        Self::Child {
            symbol,
            parent: ParentRef {
                name: parent.name.clone(),
                symbol: parent_symbol,
            },
            entry,
        }
    }

    pub fn symbol(&self) -> TypeSymbol {
        match self {
            Self::TopLevel { symbol, .. } | Self::Child { symbol, .. } => *symbol,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::TopLevel { entry, .. } => &entry.name,
            Self::Child { entry, .. } => &entry.name,
        }
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        match self {
            Self::TopLevel { .. } => None,
            Self::Child { parent, .. } => Some(parent),
        }
    }

    pub fn meta(&self) -> Option<&DescriptorMeta> {
        match self {
            Self::TopLevel { entry, .. } => entry.meta.as_ref(),
            Self::Child { entry, .. } => entry.meta.as_ref(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::TopLevel { entry, .. } => entry.description.as_deref(),
            Self::Child { entry, .. } => entry.description.as_deref(),
        }
    }

    /// Composite key: the bare name for top-level entries, `parent<connector>name`
    /// for children.
    pub fn key(&self) -> String {
        match self {
            Self::TopLevel { entry, .. } => entry.name.clone(),
            Self::Child {
                symbol,
                parent,
                entry,
            } => match symbol.connector() {
                Some(connector) => join_key(&[parent.name.as_str(), &entry.name], connector),
                None => entry.name.clone(),
            },
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_per_symbol() {
        let foo = TopLevelDescriptor::new("Foo");
        let class = Descriptor::top_level(TypeSymbol::Class, Arc::new(foo.clone()));
        assert_eq!(class.key(), "Foo");
        assert!(class.parent().is_none());

        let method = Descriptor::child(
            TypeSymbol::Method,
            &foo,
            TypeSymbol::Class,
            Arc::new(ChildDescriptor::new("bar")),
        );
        let member = Descriptor::child(
            TypeSymbol::Member,
            &foo,
            TypeSymbol::Class,
            Arc::new(ChildDescriptor::new("bar")),
        );
        let event = Descriptor::child(
            TypeSymbol::Event,
            &foo,
            TypeSymbol::Class,
            Arc::new(ChildDescriptor::new("bar")),
        );

        assert_eq!(method.key(), "Foo#bar");
        assert_eq!(member.key(), "Foo~bar");
        assert_eq!(event.key(), "Foo$bar");
        assert_eq!(event.to_string(), "Foo$bar");
        assert_eq!(method.parent().unwrap().name, "Foo");
    }

    #[test]
    fn test_serializes_entry_fields_inline() {
        let foo = TopLevelDescriptor::new("Foo");
        let method = Descriptor::child(
            TypeSymbol::Method,
            &foo,
            TypeSymbol::Class,
            Arc::new(ChildDescriptor::new("bar")),
        );
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["symbol"], "method");
        assert_eq!(value["name"], "bar");
        assert_eq!(value["parent"]["name"], "Foo");
    }
}
