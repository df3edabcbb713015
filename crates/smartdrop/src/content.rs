//! Overlay content: configuration and the node tree built from it.

use std::fmt;
use std::rc::Rc;

use smartdrop_core::MenuPalette;

use crate::host::{Host, NodeId};
use crate::interaction::SearchCallback;
use crate::layout_math::Align;
use crate::primitives::{Density, MenuEntry, RowView, describe, mount_row};

/// How the overlay content is laid out.
#[derive(Clone, Default)]
pub struct ContentConfig {
    /// Heading shown above the list (sheet header on mobile).
    pub title: Option<String>,
    pub align: Align,
    /// Gap between trigger and panel; falls back to `[desktop] offset_px`.
    pub offset_px: Option<f64>,
    pub searchable: bool,
    /// Falls back to `[search] placeholder`.
    pub search_placeholder: Option<String>,
    pub on_search: Option<SearchCallback>,
}

impl ContentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn offset_px(mut self, offset: f64) -> Self {
        self.offset_px = Some(offset);
        self
    }

    pub fn searchable(mut self, placeholder: Option<&str>) -> Self {
        self.searchable = true;
        self.search_placeholder = placeholder.map(str::to_string);
        self
    }

    pub fn on_search(mut self, callback: impl Fn(&str) + 'static) -> Self {
        self.on_search = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for ContentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentConfig")
            .field("title", &self.title)
            .field("align", &self.align)
            .field("offset_px", &self.offset_px)
            .field("searchable", &self.searchable)
            .field("search_placeholder", &self.search_placeholder)
            .field("on_search", &self.on_search.is_some())
            .finish()
    }
}

/// A rendered item row.
#[derive(Debug, Clone)]
pub struct RowSlot {
    pub node: NodeId,
    /// Index into the entry list.
    pub entry: usize,
    pub view: RowView,
}

/// Inputs for [`ContentTree::build`].
pub struct BuildContext<'a> {
    pub palette: &'a MenuPalette,
    pub density: Density,
    pub placeholder: &'a str,
    pub query: &'a str,
    /// Render a clear control next to the search input.
    pub with_clear_button: bool,
}

/// Nodes created for the content of one mounted surface.
#[derive(Debug)]
pub struct ContentTree {
    pub root: NodeId,
    pub title: Option<NodeId>,
    pub search_input: Option<NodeId>,
    pub clear_button: Option<NodeId>,
    pub list: NodeId,
    /// Item rows only, in display order.
    pub rows: Vec<RowSlot>,
}

impl ContentTree {
    pub fn build(
        host: &dyn Host,
        root: NodeId,
        config: &ContentConfig,
        entries: &[MenuEntry],
        cx: &BuildContext<'_>,
    ) -> Self {
        let title = config.title.as_ref().map(|text| {
            let node = host.create_node(Some(root));
            host.set_attribute(node, "role", "heading");
            host.set_attribute(node, "data-label", text);
            node
        });

        let (search_input, clear_button) = if config.searchable {
            let input = host.create_node(Some(root));
            host.set_attribute(input, "role", "searchbox");
            host.set_attribute(input, "placeholder", cx.placeholder);
            host.set_attribute(input, "value", cx.query);

            let clear = cx.with_clear_button.then(|| {
                let node = host.create_node(Some(root));
                host.set_attribute(node, "role", "button");
                host.set_attribute(node, "aria-label", "Clear search");
                node
            });
            (Some(input), clear)
        } else {
            (None, None)
        };

        let (list, rows) = build_list(host, root, entries, cx);

        let tree = Self {
            root,
            title,
            search_input,
            clear_button,
            list,
            rows,
        };
        tree.sync_query(host, cx.query);
        tree
    }

    /// Rebuild the list from new entries, keeping title and search nodes.
    pub fn replace_rows(&mut self, host: &dyn Host, entries: &[MenuEntry], cx: &BuildContext<'_>) {
        host.remove_node(self.list);
        let (list, rows) = build_list(host, self.root, entries, cx);
        self.list = list;
        self.rows = rows;
    }

    /// Index into `rows` of the row containing `target`.
    pub fn row_at(&self, host: &dyn Host, target: NodeId) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| host.contains(row.node, target))
    }

    /// Per-row flags for keyboard traversal.
    pub fn enabled_flags(&self) -> Vec<bool> {
        self.rows.iter().map(|row| !row.view.disabled).collect()
    }

    /// Reflect the query in the input and the clear button's visibility.
    pub fn sync_query(&self, host: &dyn Host, query: &str) {
        if let Some(input) = self.search_input {
            host.set_attribute(input, "value", query);
        }
        if let Some(clear) = self.clear_button {
            host.set_attribute(clear, "hidden", if query.is_empty() { "true" } else { "false" });
        }
    }

    /// Remove every node this tree created.
    pub fn remove(&self, host: &dyn Host) {
        for node in [self.title, self.search_input, self.clear_button]
            .into_iter()
            .flatten()
        {
            host.remove_node(node);
        }
        host.remove_node(self.list);
    }
}

fn build_list(
    host: &dyn Host,
    root: NodeId,
    entries: &[MenuEntry],
    cx: &BuildContext<'_>,
) -> (NodeId, Vec<RowSlot>) {
    let list = host.create_node(Some(root));
    host.set_attribute(list, "role", "group");

    let mut rows = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let view = describe(entry, cx.palette, cx.density);
        let node = mount_row(host, list, &view);
        if entry.as_item().is_some() {
            rows.push(RowSlot {
                node,
                entry: index,
                view,
            });
        }
    }
    (list, rows)
}
