//! Namespace-tolerant element lookup.
//!
//! CBEFF producers declare namespaces inconsistently: some qualify every
//! element with the root's default namespace, some bind a prefix on the root
//! and use it for a subset of elements, some emit no namespace at all. A
//! lookup is therefore an ordered list of selectors, each tried in turn
//! over the whole search scope; the first selector that matches anything
//! wins.

use roxmltree::Node;

/// One way of matching an element by local name
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selector {
    /// Local name in the root element's own namespace
    Qualified(String),
    /// Local name in any other namespace declared on the root element
    Declared(Vec<String>),
    /// Local name with no namespace
    Bare,
}

impl Selector {
    fn matches(&self, node: Node<'_, '_>, tag: &str) -> bool {
        if !node.is_element() || node.tag_name().name() != tag {
            return false;
        }
        let namespace = node.tag_name().namespace();
        match self {
            Selector::Qualified(uri) => namespace == Some(uri.as_str()),
            Selector::Declared(uris) => {
                namespace.is_some_and(|ns| uris.iter().any(|uri| uri == ns))
            }
            Selector::Bare => namespace.is_none(),
        }
    }
}

/// Where to look relative to the parent element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Direct element children only
    Children,
    /// Every descendant in document order, excluding the parent itself
    Descendants,
}

/// Ordered selector list derived from a document's root element
#[derive(Debug, Clone)]
pub(crate) struct Lookup {
    selectors: Vec<Selector>,
}

impl Lookup {
    /// Builds the selector list for a document rooted at `root`
    pub(crate) fn for_root(root: Node<'_, '_>) -> Self {
        let root_ns = root.tag_name().namespace();

        let mut declared: Vec<String> = Vec::new();
        for ns in root.namespaces() {
            let uri = ns.uri();
            if Some(uri) != root_ns && !declared.iter().any(|d| d == uri) {
                declared.push(uri.to_string());
            }
        }

        let mut selectors = Vec::with_capacity(3);
        if let Some(ns) = root_ns {
            selectors.push(Selector::Qualified(ns.to_string()));
        }
        if !declared.is_empty() {
            selectors.push(Selector::Declared(declared));
        }
        selectors.push(Selector::Bare);

        Self { selectors }
    }

    #[cfg(test)]
    pub(crate) fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    fn scope_iter<'a, 'input: 'a>(
        parent: Node<'a, 'input>,
        scope: Scope,
    ) -> Box<dyn Iterator<Item = Node<'a, 'input>> + 'a> {
        match scope {
            Scope::Children => Box::new(parent.children()),
            Scope::Descendants => Box::new(parent.descendants().skip(1)),
        }
    }

    /// First element named `tag` in `scope`, using the first selector that matches
    pub(crate) fn find<'a, 'input: 'a>(
        &self,
        parent: Node<'a, 'input>,
        tag: &str,
        scope: Scope,
    ) -> Option<Node<'a, 'input>> {
        self.selectors.iter().find_map(|selector| {
            Self::scope_iter(parent, scope).find(|node| selector.matches(*node, tag))
        })
    }

    /// Every element named `tag` in `scope`, using the first selector that matches
    pub(crate) fn find_all<'a, 'input: 'a>(
        &self,
        parent: Node<'a, 'input>,
        tag: &str,
        scope: Scope,
    ) -> Vec<Node<'a, 'input>> {
        for selector in &self.selectors {
            let found: Vec<_> = Self::scope_iter(parent, scope)
                .filter(|node| selector.matches(*node, tag))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Direct child named `tag`, falling back to any descendant
    pub(crate) fn find_child_or_descendant<'a, 'input: 'a>(
        &self,
        parent: Node<'a, 'input>,
        tag: &str,
    ) -> Option<Node<'a, 'input>> {
        self.find(parent, tag, Scope::Children)
            .or_else(|| self.find(parent, tag, Scope::Descendants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    #[test]
    fn test_selectors_without_namespace() {
        let doc = Document::parse("<BIR><BDB>AA==</BDB></BIR>").unwrap();
        let lookup = Lookup::for_root(doc.root_element());
        assert!(lookup.selectors().contains(&Selector::Bare));
        assert!(!lookup
            .selectors()
            .iter()
            .any(|s| matches!(s, Selector::Qualified(_))));
    }

    #[test]
    fn test_qualified_before_bare() {
        let xml = r#"<BIR xmlns="http://standards.iso.org/iso-iec/19785/-3/ed-2/">
            <BDB xmlns="">bare</BDB>
            <BDB>qualified</BDB>
        </BIR>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();
        let lookup = Lookup::for_root(root);

        let bdb = lookup.find(root, "BDB", Scope::Children).unwrap();
        assert_eq!(bdb.text(), Some("qualified"));
        assert_eq!(
            lookup.selectors()[0],
            Selector::Qualified("http://standards.iso.org/iso-iec/19785/-3/ed-2/".into())
        );
    }

    #[test]
    fn test_declared_prefix_namespace() {
        let xml = r#"<BIR xmlns:cbeff="urn:cbeff">
            <cbeff:BDBInfo><cbeff:Type>Finger</cbeff:Type></cbeff:BDBInfo>
        </BIR>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();
        let lookup = Lookup::for_root(root);

        let info = lookup.find(root, "BDBInfo", Scope::Descendants).unwrap();
        let ty = lookup.find_child_or_descendant(info, "Type").unwrap();
        assert_eq!(ty.text(), Some("Finger"));
    }

    #[test]
    fn test_descendants_exclude_parent() {
        let doc = Document::parse("<BIR><BIR/><X><BIR/></X></BIR>").unwrap();
        let root = doc.root_element();
        let lookup = Lookup::for_root(root);
        assert_eq!(lookup.find_all(root, "BIR", Scope::Descendants).len(), 2);
        assert_eq!(lookup.find_all(root, "BIR", Scope::Children).len(), 1);
    }

    #[test]
    fn test_child_preferred_over_descendant() {
        let xml = "<BDBInfo><Format><Type>7</Type></Format><Type>Iris</Type></BDBInfo>";
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();
        let lookup = Lookup::for_root(root);
        let ty = lookup.find_child_or_descendant(root, "Type").unwrap();
        assert_eq!(ty.text(), Some("Iris"));
    }
}
