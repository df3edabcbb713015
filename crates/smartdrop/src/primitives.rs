//! Menu building blocks: items, labels, separators and empty states.
//!
//! Entries are plain data until a [`MenuScope`] (or the controller itself)
//! resolves them into a [`RowView`] against a live dropdown's palette and
//! viewport density.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use smartdrop_core::{MenuPalette, RowColors, RowIntent};

use crate::controller::Dropdown;
use crate::error::{Error, Result};
use crate::host::{Host, NodeId};
use crate::layout_math::ViewportClass;

pub type SelectHandler = Rc<dyn Fn()>;

/// A clickable menu row.
#[derive(Clone, Default)]
pub struct Item {
    pub label: String,
    pub selected: bool,
    pub disabled: bool,
    pub destructive: bool,
    /// Leave the overlay open after selection (checklists).
    pub keep_open: bool,
    pub on_select: Option<SelectHandler>,
}

impl Item {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }

    pub fn keep_open(mut self, keep_open: bool) -> Self {
        self.keep_open = keep_open;
        self
    }

    pub fn on_select(mut self, handler: impl Fn() + 'static) -> Self {
        self.on_select = Some(Rc::new(handler));
        self
    }

    pub fn intent(&self) -> RowIntent {
        RowIntent {
            selected: self.selected,
            disabled: self.disabled,
            destructive: self.destructive,
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("label", &self.label)
            .field("selected", &self.selected)
            .field("disabled", &self.disabled)
            .field("destructive", &self.destructive)
            .field("keep_open", &self.keep_open)
            .finish_non_exhaustive()
    }
}

/// One row of menu content.
#[derive(Debug, Clone)]
pub enum MenuEntry {
    Item(Item),
    /// Section heading.
    Label(String),
    Separator,
    /// Placeholder shown when a list has nothing to show.
    Empty(String),
}

impl From<Item> for MenuEntry {
    fn from(item: Item) -> Self {
        MenuEntry::Item(item)
    }
}

impl MenuEntry {
    pub fn label(text: impl Into<String>) -> Self {
        MenuEntry::Label(text.into())
    }

    pub fn empty(text: impl Into<String>) -> Self {
        MenuEntry::Empty(text.into())
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            MenuEntry::Item(item) => Some(item),
            _ => None,
        }
    }

    /// Text shown for the row, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            MenuEntry::Item(item) => Some(&item.label),
            MenuEntry::Label(text) | MenuEntry::Empty(text) => Some(text),
            MenuEntry::Separator => None,
        }
    }
}

/// Row sizing. Touch layouts get larger targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    /// Mobile sheet rows.
    Comfortable,
    /// Desktop panel rows.
    Compact,
}

/// Padding and font size of a row, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowMetrics {
    pub padding_x: f64,
    pub padding_y: f64,
    pub font_size: f64,
}

impl Density {
    pub fn for_class(class: ViewportClass) -> Self {
        match class {
            ViewportClass::Mobile => Density::Comfortable,
            ViewportClass::Desktop => Density::Compact,
        }
    }

    pub fn metrics(self) -> RowMetrics {
        match self {
            Density::Comfortable => RowMetrics {
                padding_x: 16.0,
                padding_y: 14.0,
                font_size: 16.0,
            },
            Density::Compact => RowMetrics {
                padding_x: 12.0,
                padding_y: 8.0,
                font_size: 14.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowRole {
    Item,
    Label,
    Separator,
    Empty,
}

impl RowRole {
    fn aria_role(self) -> &'static str {
        match self {
            RowRole::Item => "menuitem",
            RowRole::Label => "presentation",
            RowRole::Separator => "separator",
            RowRole::Empty => "status",
        }
    }
}

/// Resolved presentation of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub role: RowRole,
    pub text: Option<String>,
    pub density: Density,
    /// Only items carry colours.
    pub colors: Option<RowColors>,
    pub selected: bool,
    pub disabled: bool,
    pub destructive: bool,
}

impl RowView {
    /// Takes part in clicks and keyboard traversal.
    pub fn is_interactive(&self) -> bool {
        self.role == RowRole::Item && !self.disabled
    }
}

/// Resolve an entry against a palette and density.
pub fn describe(entry: &MenuEntry, palette: &MenuPalette, density: Density) -> RowView {
    let role = match entry {
        MenuEntry::Item(_) => RowRole::Item,
        MenuEntry::Label(_) => RowRole::Label,
        MenuEntry::Separator => RowRole::Separator,
        MenuEntry::Empty(_) => RowRole::Empty,
    };
    let item = entry.as_item();

    RowView {
        role,
        text: entry.text().map(str::to_string),
        density,
        colors: item.map(|item| palette.row_colors(item.intent())),
        selected: item.is_some_and(|item| item.selected),
        disabled: item.is_some_and(|item| item.disabled),
        destructive: item.is_some_and(|item| item.destructive),
    }
}

/// Create the node for a row under `parent` and write its attributes.
pub fn mount_row(host: &dyn Host, parent: NodeId, view: &RowView) -> NodeId {
    let node = host.create_node(Some(parent));
    host.set_attribute(node, "role", view.role.aria_role());
    if let Some(text) = &view.text {
        host.set_attribute(node, "data-label", text);
    }

    if view.role == RowRole::Item {
        host.set_attribute(node, "tabindex", "-1");
        host.set_attribute(node, "aria-disabled", bool_str(view.disabled));
        host.set_attribute(node, "data-selected", bool_str(view.selected));
        host.set_attribute(node, "data-destructive", bool_str(view.destructive));
    }

    let metrics = view.density.metrics();
    let mut style = format!(
        "padding: {}px {}px; font-size: {}px;",
        metrics.padding_y, metrics.padding_x, metrics.font_size
    );
    if let Some(colors) = &view.colors {
        style.push_str(&format!(
            " color: {}; background: {}; opacity: {};",
            colors.foreground, colors.background, colors.opacity
        ));
    }
    host.set_attribute(node, "style", &style);
    node
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Handle through which custom content reaches its dropdown.
///
/// Holds the controller weakly; every call fails with
/// [`Error::OutsideController`] once the controller is gone.
#[derive(Clone)]
pub struct MenuScope {
    controller: Weak<Dropdown>,
}

impl MenuScope {
    pub(crate) fn new(controller: Weak<Dropdown>) -> Self {
        Self { controller }
    }

    /// A scope not attached to any controller.
    pub fn detached() -> Self {
        Self {
            controller: Weak::new(),
        }
    }

    fn controller(&self) -> Result<Rc<Dropdown>> {
        self.controller.upgrade().ok_or(Error::OutsideController)
    }

    pub fn describe(&self, entry: &MenuEntry) -> Result<RowView> {
        let controller = self.controller()?;
        let density = Density::for_class(controller.viewport_class());
        Ok(describe(entry, controller.palette(), density))
    }

    pub fn describe_all(&self, entries: &[MenuEntry]) -> Result<Vec<RowView>> {
        entries.iter().map(|entry| self.describe(entry)).collect()
    }

    pub fn is_open(&self) -> Result<bool> {
        Ok(self.controller()?.is_open())
    }

    pub fn viewport_class(&self) -> Result<ViewportClass> {
        Ok(self.controller()?.viewport_class())
    }

    pub fn close(&self) -> Result<()> {
        self.controller()?.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_builder() {
        let item = Item::new("Delete").destructive(true).keep_open(true);
        assert_eq!(item.label, "Delete");
        assert!(item.destructive);
        assert!(item.keep_open);
        assert!(!item.disabled);
        assert!(item.on_select.is_none());
    }

    #[test]
    fn test_describe_item_colors() {
        let palette = MenuPalette::default();
        let entry: MenuEntry = Item::new("Work").selected(true).into();
        let view = describe(&entry, &palette, Density::Compact);

        assert_eq!(view.role, RowRole::Item);
        assert_eq!(view.text.as_deref(), Some("Work"));
        let colors = view.colors.as_ref().unwrap();
        assert_eq!(colors.foreground, palette.accent);
        assert!(view.is_interactive());
    }

    #[test]
    fn test_row_view_serializes_colors() {
        let palette = MenuPalette::default();
        let entry: MenuEntry = Item::new("Delete").destructive(true).into();
        let view = describe(&entry, &palette, Density::Compact);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["colors"]["foreground"], palette.error.as_str());
        assert_eq!(json["colors"]["opacity"], 1.0);
    }

    #[test]
    fn test_disabled_item_not_interactive() {
        let palette = MenuPalette::default();
        let entry: MenuEntry = Item::new("Locked").disabled(true).into();
        let view = describe(&entry, &palette, Density::Compact);
        assert!(!view.is_interactive());
        assert_eq!(view.colors.unwrap().opacity, 0.4);
    }

    #[test]
    fn test_presentational_entries() {
        let palette = MenuPalette::default();
        for entry in [
            MenuEntry::label("Notebooks"),
            MenuEntry::Separator,
            MenuEntry::empty("No results"),
        ] {
            let view = describe(&entry, &palette, Density::Comfortable);
            assert!(view.colors.is_none());
            assert!(!view.is_interactive());
        }
    }

    #[test]
    fn test_density_metrics() {
        assert_eq!(Density::for_class(ViewportClass::Mobile), Density::Comfortable);
        assert_eq!(Density::Comfortable.metrics().padding_y, 14.0);
        assert_eq!(Density::Compact.metrics().font_size, 14.0);
    }

    #[test]
    fn test_detached_scope_fails_fast() {
        let scope = MenuScope::detached();
        assert!(matches!(
            scope.describe(&MenuEntry::Separator),
            Err(Error::OutsideController)
        ));
        assert!(matches!(scope.close(), Err(Error::OutsideController)));
    }
}
