//! The dropdown controller: one overlay instance's single source of truth.
//!
//! A [`Dropdown`] owns the open/closed state, the viewport class, the
//! presence machine and whichever surface is mounted. Callers hold the
//! `Rc<Dropdown>` handle explicitly; there is no ambient context, and any
//! number of controllers can coexist on one host.
//!
//! Surfaces are a tagged variant resolved when content mounts: an anchored
//! panel on desktop or a bottom sheet on mobile, never both. When the
//! viewport class changes while content is mounted, the old surface is torn
//! down on the spot and the other one is mounted in the same presence phase.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::Serialize;
use smartdrop_core::{Config, MenuPalette};
use tracing::debug;

use crate::content::{BuildContext, ContentConfig, ContentTree};
use crate::error::{Error, Result};
use crate::host::{Event, EventKind, Host, Key, ListenerId, ListenerTarget, NodeId, Phase, TimerId};
use crate::interaction::{RovingFocus, SearchState, is_outside};
use crate::layout_math::ViewportClass;
use crate::presence::{Presence, PresenceEvent, PresencePhase, PresenceRecord};
use crate::primitives::{Density, MenuEntry, MenuScope};
use crate::trigger::{TriggerBinding, TriggerHandle, next_content_id};
use crate::widgets::{AnchoredPanel, AnchoredView, BottomSheet, Placement, SheetView};

pub type OpenChangeCallback = Rc<dyn Fn(bool)>;

/// Construction options.
#[derive(Clone, Default)]
pub struct DropdownOptions {
    /// Controlled open state. While set, the caller owns the value and pushes
    /// changes back through [`Dropdown::set_controlled`].
    pub open: Option<bool>,
    /// Initial value for uncontrolled mode.
    pub default_open: bool,
    /// Called with the requested state on every change, in both modes.
    pub on_open_change: Option<OpenChangeCallback>,
}

impl DropdownOptions {
    pub fn controlled(open: bool, on_open_change: impl Fn(bool) + 'static) -> Self {
        Self {
            open: Some(open),
            default_open: false,
            on_open_change: Some(Rc::new(on_open_change)),
        }
    }

    pub fn on_open_change(mut self, callback: impl Fn(bool) + 'static) -> Self {
        self.on_open_change = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for DropdownOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropdownOptions")
            .field("open", &self.open)
            .field("default_open", &self.default_open)
            .field("on_open_change", &self.on_open_change.is_some())
            .finish()
    }
}

/// The mounted rendering engine.
pub enum Surface {
    Desktop(Rc<AnchoredPanel>),
    Mobile(Rc<BottomSheet>),
}

impl Surface {
    /// Outermost node of the panel; pointer-downs inside it are not outside
    /// clicks.
    pub fn node(&self) -> NodeId {
        match self {
            Surface::Desktop(panel) => panel.node(),
            Surface::Mobile(sheet) => sheet.node(),
        }
    }

    /// Node the content tree is built into.
    pub fn content_root(&self) -> NodeId {
        match self {
            Surface::Desktop(panel) => panel.node(),
            Surface::Mobile(sheet) => sheet.body(),
        }
    }

    pub fn class(&self) -> ViewportClass {
        match self {
            Surface::Desktop(_) => ViewportClass::Desktop,
            Surface::Mobile(_) => ViewportClass::Mobile,
        }
    }

    fn show(&self) {
        match self {
            Surface::Desktop(panel) => panel.show(),
            Surface::Mobile(sheet) => sheet.show(),
        }
    }

    fn hide(&self) {
        match self {
            Surface::Desktop(panel) => panel.hide(),
            Surface::Mobile(sheet) => sheet.hide(),
        }
    }

    fn teardown(&self) {
        match self {
            Surface::Desktop(panel) => panel.teardown(),
            Surface::Mobile(sheet) => sheet.teardown(),
        }
    }

    fn view(&self) -> OverlayView {
        match self {
            Surface::Desktop(panel) => OverlayView::Desktop(panel.view()),
            Surface::Mobile(sheet) => OverlayView::Mobile(sheet.view()),
        }
    }
}

/// Snapshot of the mounted surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "surface", rename_all = "lowercase")]
pub enum OverlayView {
    Desktop(AnchoredView),
    Mobile(SheetView),
}

/// Node handles of the mounted overlay, for hosts and tests that need to
/// address them.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNodes {
    pub surface: NodeId,
    pub content_root: NodeId,
    pub backdrop: Option<NodeId>,
    pub handle: Option<NodeId>,
    pub search_input: Option<NodeId>,
    pub clear_button: Option<NodeId>,
    /// Item rows in display order.
    pub rows: Vec<NodeId>,
}

struct Mounted {
    surface: Surface,
    tree: ContentTree,
    listeners: Vec<ListenerId>,
}

enum ContentAction {
    ClearSearch,
    Select(usize),
}

pub struct Dropdown {
    host: Rc<dyn Host>,
    config: Config,
    palette: MenuPalette,
    content_id: String,
    weak: Weak<Dropdown>,
    controlled: Cell<Option<bool>>,
    internal_open: Cell<bool>,
    on_open_change: RefCell<Option<OpenChangeCallback>>,
    class: Cell<ViewportClass>,
    presence: Rc<Presence>,
    trigger: RefCell<Option<TriggerBinding>>,
    content: RefCell<ContentConfig>,
    entries: RefCell<Vec<MenuEntry>>,
    search: SearchState,
    mounted: RefCell<Option<Mounted>>,
    dismissal: RefCell<Vec<ListenerId>>,
    resize_listener: Cell<Option<ListenerId>>,
    focus: RefCell<RovingFocus>,
    focus_timer: Cell<Option<TimerId>>,
}

impl Dropdown {
    pub fn new(host: Rc<dyn Host>, config: &Config, options: DropdownOptions) -> Rc<Self> {
        let class = ViewportClass::from_width(
            host.viewport().width,
            config.breakpoint.mobile_below_px,
        );

        let dropdown = Rc::new_cyclic(|weak: &Weak<Dropdown>| {
            let observer_weak = weak.clone();
            let presence = Presence::new(
                host.clone(),
                Box::new(move |event| {
                    if let Some(dropdown) = observer_weak.upgrade() {
                        dropdown.on_presence(event);
                    }
                }),
            );

            Self {
                host: host.clone(),
                config: config.clone(),
                palette: MenuPalette::from_config(&config.theme),
                content_id: next_content_id(),
                weak: weak.clone(),
                controlled: Cell::new(options.open),
                internal_open: Cell::new(options.default_open),
                on_open_change: RefCell::new(options.on_open_change),
                class: Cell::new(class),
                presence,
                trigger: RefCell::new(None),
                content: RefCell::new(ContentConfig::default()),
                entries: RefCell::new(Vec::new()),
                search: SearchState::default(),
                mounted: RefCell::new(None),
                dismissal: RefCell::new(Vec::new()),
                resize_listener: Cell::new(None),
                focus: RefCell::new(RovingFocus::default()),
                focus_timer: Cell::new(None),
            }
        });

        let weak = Rc::downgrade(&dropdown);
        let id = dropdown.host.add_listener(
            ListenerTarget::Window,
            EventKind::Resize,
            Phase::Bubble,
            Rc::new(move |_| {
                if let Some(dropdown) = weak.upgrade() {
                    dropdown.on_resize();
                }
            }),
        );
        dropdown.resize_listener.set(Some(id));

        debug!(
            "Dropdown {} created ({:?}, open: {})",
            dropdown.content_id,
            class,
            dropdown.is_open()
        );
        if dropdown.is_open() {
            dropdown.sync();
        }
        dropdown
    }

    pub fn is_open(&self) -> bool {
        self.controlled.get().unwrap_or(self.internal_open.get())
    }

    pub fn open(&self) {
        self.set_open(true);
    }

    /// Close the overlay. No-op when already closed.
    pub fn close(&self) {
        self.set_open(false);
    }

    pub fn toggle(&self) {
        self.set_open(!self.is_open());
    }

    /// Push a new controlled value, or `None` to switch to uncontrolled mode
    /// (keeping the current state).
    pub fn set_controlled(&self, open: Option<bool>) {
        if open.is_none() {
            self.internal_open.set(self.is_open());
        }
        self.controlled.set(open);
        self.sync();
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled.get().is_some()
    }

    pub fn set_on_open_change(&self, callback: Option<OpenChangeCallback>) {
        *self.on_open_change.borrow_mut() = callback;
    }

    pub fn viewport_class(&self) -> ViewportClass {
        self.class.get()
    }

    pub fn palette(&self) -> &MenuPalette {
        &self.palette
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// DOM id of the content, referenced by the trigger's `aria-controls`.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn phase(&self) -> PresencePhase {
        self.presence.phase()
    }

    pub fn presence(&self) -> PresenceRecord {
        self.presence.record()
    }

    /// Scope handle for building custom content against this controller.
    pub fn scope(&self) -> MenuScope {
        MenuScope::new(self.weak.clone())
    }

    /// Attach toggle behaviour and ARIA metadata to `node`.
    ///
    /// A dropdown has exactly one trigger; binding a second one fails with
    /// [`Error::TriggerAlreadyBound`].
    pub fn bind_trigger(&self, node: NodeId) -> Result<TriggerHandle> {
        if let Some(existing) = self.trigger.borrow().as_ref() {
            return Err(Error::TriggerAlreadyBound(existing.node()));
        }

        let weak = self.weak.clone();
        let binding = TriggerBinding::bind(
            &*self.host,
            node,
            &self.content_id,
            self.is_open(),
            Rc::new(move || {
                if let Some(dropdown) = weak.upgrade() {
                    dropdown.toggle();
                }
            }),
        );
        let handle = binding.handle();
        *self.trigger.borrow_mut() = Some(binding);
        Ok(handle)
    }

    pub fn unbind_trigger(&self) -> Option<TriggerHandle> {
        let binding = self.trigger.borrow_mut().take()?;
        let handle = binding.handle();
        binding.unbind(&*self.host);
        Some(handle)
    }

    pub fn trigger(&self) -> Option<TriggerHandle> {
        self.trigger.borrow().as_ref().map(TriggerBinding::handle)
    }

    /// Set the content layout and entries. Rebuilds mounted content.
    pub fn render_content(&self, config: ContentConfig, entries: Vec<MenuEntry>) {
        self.search.set_callback(config.on_search.clone());
        *self.content.borrow_mut() = config;
        *self.entries.borrow_mut() = entries;

        if self.presence.is_mounted() {
            self.remount_content();
        }
    }

    /// Replace the entries only, e.g. with a filtered list from a search
    /// callback. Title and search input stay in place.
    pub fn set_entries(&self, entries: Vec<MenuEntry>) {
        *self.entries.borrow_mut() = entries;

        let query = self.search.query();
        let placeholder = self.placeholder();
        let class = self.class.get();
        let rebuilt = {
            let entries = self.entries.borrow();
            let mut mounted = self.mounted.borrow_mut();
            match mounted.as_mut() {
                Some(mounted) => {
                    mounted.tree.replace_rows(
                        &*self.host,
                        &entries,
                        &self.build_context(class, &placeholder, &query),
                    );
                    self.style_list(class, &mounted.tree);
                    Some(mounted.tree.enabled_flags())
                }
                None => None,
            }
        };

        if let Some(flags) = rebuilt {
            *self.focus.borrow_mut() = RovingFocus::new(flags);
            self.reposition();
        }
    }

    pub fn entries(&self) -> Vec<MenuEntry> {
        self.entries.borrow().clone()
    }

    pub fn search_query(&self) -> String {
        self.search.query()
    }

    /// Feed text into the search input, as if typed.
    pub fn search(&self, query: &str) {
        self.search.input(query);
        self.sync_query();
    }

    /// Reset the search input and report `""` to the caller.
    pub fn clear_search(&self) {
        self.search.clear();
        self.sync_query();
    }

    /// Select the entry at `index`. Disabled items and non-items are ignored.
    pub fn select(&self, index: usize) {
        let item = self
            .entries
            .borrow()
            .get(index)
            .and_then(MenuEntry::as_item)
            .cloned();
        let Some(item) = item else {
            return;
        };
        if item.disabled {
            return;
        }

        debug!("Dropdown {} selected {:?}", self.content_id, item.label);
        if let Some(handler) = item.on_select {
            handler();
        }
        if !item.keep_open {
            self.close();
        }
    }

    /// Entry index of the item row holding keyboard focus.
    pub fn focused_entry(&self) -> Option<usize> {
        let row = self.focus.borrow().current()?;
        self.mounted
            .borrow()
            .as_ref()
            .and_then(|mounted| mounted.tree.rows.get(row).map(|slot| slot.entry))
    }

    pub fn view(&self) -> Option<OverlayView> {
        self.mounted
            .borrow()
            .as_ref()
            .map(|mounted| mounted.surface.view())
    }

    pub fn nodes(&self) -> Option<OverlayNodes> {
        let mounted = self.mounted.borrow();
        let mounted = mounted.as_ref()?;
        let (backdrop, handle) = match &mounted.surface {
            Surface::Desktop(_) => (None, None),
            Surface::Mobile(sheet) => (Some(sheet.backdrop()), Some(sheet.handle())),
        };
        Some(OverlayNodes {
            surface: mounted.surface.node(),
            content_root: mounted.surface.content_root(),
            backdrop,
            handle,
            search_input: mounted.tree.search_input,
            clear_button: mounted.tree.clear_button,
            rows: mounted.tree.rows.iter().map(|row| row.node).collect(),
        })
    }

    fn set_open(&self, open: bool) {
        if self.is_open() == open {
            return;
        }
        if self.controlled.get().is_none() {
            self.internal_open.set(open);
        }
        debug!(
            "Dropdown {} {} requested",
            self.content_id,
            if open { "open" } else { "close" }
        );

        let callback = self.on_open_change.borrow().clone();
        if let Some(callback) = callback {
            callback(open);
        }
        self.sync();
    }

    /// Drive presence and trigger state from `is_open()`.
    fn sync(&self) {
        let open = self.is_open();
        if let Some(binding) = self.trigger.borrow().as_ref() {
            binding.set_expanded(&*self.host, open);
        }

        if open {
            self.presence.request_open();
            self.activate();
        } else {
            self.presence.request_close(self.exit_duration());
        }
    }

    fn exit_duration(&self) -> Duration {
        match self.class.get() {
            ViewportClass::Desktop => self.config.desktop.exit_duration(),
            ViewportClass::Mobile => self.config.sheet.exit_duration(),
        }
    }

    fn placeholder(&self) -> String {
        self.content
            .borrow()
            .search_placeholder
            .clone()
            .unwrap_or_else(|| self.config.search.placeholder.clone())
    }

    fn build_context<'a>(
        &'a self,
        class: ViewportClass,
        placeholder: &'a str,
        query: &'a str,
    ) -> BuildContext<'a> {
        BuildContext {
            palette: &self.palette,
            density: Density::for_class(class),
            placeholder,
            query,
            with_clear_button: class == ViewportClass::Mobile,
        }
    }

    fn style_list(&self, class: ViewportClass, tree: &ContentTree) {
        if class == ViewportClass::Desktop {
            self.host.set_attribute(
                tree.list,
                "style",
                &format!(
                    "overflow-y: auto; max-height: {}px;",
                    self.config.desktop.max_height_px
                ),
            );
        }
    }

    fn on_presence(&self, event: PresenceEvent) {
        debug!("Dropdown {} presence: {:?}", self.content_id, event);
        match event {
            PresenceEvent::Mount => self.mount_surface(),
            PresenceEvent::Show => {
                if let Some(mounted) = self.mounted.borrow().as_ref() {
                    mounted.surface.show();
                }
            }
            PresenceEvent::Hide => self.deactivate(),
            PresenceEvent::Unmount => self.unmount_surface(),
        }
    }

    fn mount_surface(&self) {
        let class = self.class.get();
        let (align, offset) = {
            let content = self.content.borrow();
            (
                content.align,
                content.offset_px.unwrap_or(self.config.desktop.offset_px),
            )
        };

        let surface = match class {
            ViewportClass::Desktop => {
                let trigger = self.trigger.borrow().as_ref().map(TriggerBinding::node);
                Surface::Desktop(AnchoredPanel::mount(
                    self.host.clone(),
                    &self.config.desktop,
                    Placement { align, offset },
                    trigger,
                    &self.content_id,
                ))
            }
            ViewportClass::Mobile => {
                let weak = self.weak.clone();
                Surface::Mobile(BottomSheet::mount(
                    self.host.clone(),
                    &self.config.sheet,
                    &self.content_id,
                    &self.palette.backdrop(),
                    Rc::new(move || {
                        if let Some(dropdown) = weak.upgrade() {
                            debug!("Dropdown {} dismissed by drag", dropdown.content_id);
                            dropdown.close();
                        }
                    }),
                ))
            }
        };

        let tree = self.build_tree(class, surface.content_root());
        let listeners = self.attach_content_listeners(&surface, &tree);
        *self.focus.borrow_mut() = RovingFocus::new(tree.enabled_flags());
        *self.mounted.borrow_mut() = Some(Mounted {
            surface,
            tree,
            listeners,
        });
    }

    fn build_tree(&self, class: ViewportClass, root: NodeId) -> ContentTree {
        let placeholder = self.placeholder();
        let query = self.search.query();
        let tree = ContentTree::build(
            &*self.host,
            root,
            &self.content.borrow(),
            &self.entries.borrow(),
            &self.build_context(class, &placeholder, &query),
        );
        self.style_list(class, &tree);
        tree
    }

    fn attach_content_listeners(&self, surface: &Surface, tree: &ContentTree) -> Vec<ListenerId> {
        let mut ids = Vec::with_capacity(2);

        let weak = self.weak.clone();
        ids.push(self.host.add_listener(
            ListenerTarget::Node(surface.content_root()),
            EventKind::Click,
            Phase::Bubble,
            Rc::new(move |event| {
                if let (Some(dropdown), Some(target)) = (weak.upgrade(), event.target()) {
                    dropdown.on_content_click(target);
                }
            }),
        ));

        if let Some(input) = tree.search_input {
            let weak = self.weak.clone();
            ids.push(self.host.add_listener(
                ListenerTarget::Node(input),
                EventKind::Input,
                Phase::Bubble,
                Rc::new(move |event| {
                    if let (Some(dropdown), Event::Input { value, .. }) = (weak.upgrade(), event) {
                        dropdown.search(value);
                    }
                }),
            ));
        }

        ids
    }

    /// Rebuild the whole content tree inside the mounted surface.
    fn remount_content(&self) {
        let previous = self.mounted.borrow_mut().take();
        let Some(Mounted {
            surface,
            tree,
            listeners,
        }) = previous
        else {
            return;
        };

        for id in listeners {
            self.host.remove_listener(id);
        }
        tree.remove(&*self.host);

        let class = surface.class();
        let tree = self.build_tree(class, surface.content_root());
        let listeners = self.attach_content_listeners(&surface, &tree);
        *self.focus.borrow_mut() = RovingFocus::new(tree.enabled_flags());
        *self.mounted.borrow_mut() = Some(Mounted {
            surface,
            tree,
            listeners,
        });
        self.reposition();
    }

    /// Wire up dismissal, tracking and initial focus while opening or open.
    /// Idempotent.
    fn activate(&self) {
        if !matches!(
            self.presence.phase(),
            PresencePhase::Opening | PresencePhase::Open
        ) {
            return;
        }

        let panel = match self.mounted.borrow().as_ref().map(|m| &m.surface) {
            Some(Surface::Desktop(panel)) => Some(panel.clone()),
            Some(Surface::Mobile(_)) => None,
            None => return,
        };

        self.attach_dismissal();

        if let Some(panel) = panel {
            panel.reposition();
            panel.attach_tracking();
            if self.focus_timer.get().is_none() && self.focus.borrow().current().is_none() {
                self.schedule_focus();
            }
        }
    }

    /// Undo [`Self::activate`] and reset transient input state when the exit
    /// transition starts.
    fn deactivate(&self) {
        self.detach_dismissal();
        self.cancel_focus_timer();
        self.focus.borrow_mut().clear();
        if let Some(mounted) = self.mounted.borrow().as_ref() {
            mounted.surface.hide();
        }
        self.clear_search();
    }

    fn unmount_surface(&self) {
        self.detach_dismissal();
        self.cancel_focus_timer();
        *self.focus.borrow_mut() = RovingFocus::default();

        let mounted = self.mounted.borrow_mut().take();
        if let Some(mounted) = mounted {
            for id in mounted.listeners {
                self.host.remove_listener(id);
            }
            mounted.surface.teardown();
        }
    }

    fn attach_dismissal(&self) {
        if !self.dismissal.borrow().is_empty() {
            return;
        }

        let weak = self.weak.clone();
        let outside = self.host.add_listener(
            ListenerTarget::Document,
            EventKind::PointerDown,
            Phase::Capture,
            Rc::new(move |event| {
                if let (Some(dropdown), Some(target)) = (weak.upgrade(), event.target()) {
                    dropdown.on_pointer_down(target);
                }
            }),
        );

        let weak = self.weak.clone();
        let keys = self.host.add_listener(
            ListenerTarget::Document,
            EventKind::KeyDown,
            Phase::Bubble,
            Rc::new(move |event| {
                if let (Some(dropdown), Event::KeyDown { key }) = (weak.upgrade(), event) {
                    dropdown.on_key(key);
                }
            }),
        );

        *self.dismissal.borrow_mut() = vec![outside, keys];
    }

    fn detach_dismissal(&self) {
        let ids = std::mem::take(&mut *self.dismissal.borrow_mut());
        for id in ids {
            self.host.remove_listener(id);
        }
    }

    fn schedule_focus(&self) {
        self.cancel_focus_timer();
        let weak = self.weak.clone();
        let id = self.host.set_timeout(
            self.config.desktop.focus_delay(),
            Box::new(move || {
                if let Some(dropdown) = weak.upgrade() {
                    dropdown.focus_timer.set(None);
                    let first = dropdown.focus.borrow_mut().first();
                    if let Some(row) = first {
                        dropdown.focus_row(row);
                    }
                }
            }),
        );
        self.focus_timer.set(Some(id));
    }

    fn cancel_focus_timer(&self) {
        if let Some(id) = self.focus_timer.take() {
            self.host.clear_timer(id);
        }
    }

    fn focus_row(&self, row: usize) {
        let node = self
            .mounted
            .borrow()
            .as_ref()
            .and_then(|mounted| mounted.tree.rows.get(row).map(|slot| slot.node));
        if let Some(node) = node {
            self.host.focus(node);
        }
    }

    fn reposition(&self) {
        let panel = match self.mounted.borrow().as_ref().map(|m| &m.surface) {
            Some(Surface::Desktop(panel)) => panel.clone(),
            _ => return,
        };
        if panel.is_tracking() {
            panel.reposition();
        }
    }

    fn sync_query(&self) {
        let query = self.search.query();
        if let Some(mounted) = self.mounted.borrow().as_ref() {
            mounted.tree.sync_query(&*self.host, &query);
        }
    }

    fn on_pointer_down(&self, target: NodeId) {
        let panel = self.mounted.borrow().as_ref().map(|m| m.surface.node());
        let trigger = self.trigger.borrow().as_ref().map(TriggerBinding::node);
        if is_outside(&*self.host, target, panel, trigger) {
            debug!("Dropdown {} outside click", self.content_id);
            self.close();
        }
    }

    fn on_key(&self, key: &Key) {
        match key {
            Key::Escape => {
                self.close();
                let trigger = self.trigger.borrow().as_ref().map(TriggerBinding::node);
                if let Some(node) = trigger {
                    self.host.focus(node);
                }
            }
            Key::Enter if self.class.get() == ViewportClass::Desktop => {
                if let Some(index) = self.focused_entry() {
                    self.select(index);
                }
            }
            Key::ArrowDown | Key::ArrowUp | Key::Home | Key::End
                if self.class.get() == ViewportClass::Desktop =>
            {
                // Manual navigation overrides the delayed initial focus
                self.cancel_focus_timer();
                let row = self.focus.borrow_mut().handle_key(key);
                if let Some(row) = row {
                    self.focus_row(row);
                }
            }
            _ => {}
        }
    }

    fn on_content_click(&self, target: NodeId) {
        let action = {
            let mounted = self.mounted.borrow();
            let Some(mounted) = mounted.as_ref() else {
                return;
            };
            let tree = &mounted.tree;
            if tree
                .clear_button
                .is_some_and(|clear| self.host.contains(clear, target))
            {
                Some(ContentAction::ClearSearch)
            } else {
                tree.row_at(&*self.host, target)
                    .map(|row| ContentAction::Select(tree.rows[row].entry))
            }
        };

        match action {
            Some(ContentAction::ClearSearch) => self.clear_search(),
            Some(ContentAction::Select(index)) => self.select(index),
            None => {}
        }
    }

    fn on_resize(&self) {
        let next = ViewportClass::from_width(
            self.host.viewport().width,
            self.config.breakpoint.mobile_below_px,
        );
        let previous = self.class.replace(next);

        if next == previous {
            if let Some(Surface::Mobile(sheet)) = self.mounted.borrow().as_ref().map(|m| &m.surface)
            {
                sheet.relayout();
            }
            return;
        }

        debug!(
            "Dropdown {} reclassified {:?} → {:?}",
            self.content_id, previous, next
        );
        if !self.presence.is_mounted() {
            return;
        }

        self.unmount_surface();
        self.mount_surface();
        match self.presence.phase() {
            PresencePhase::Opening => self.activate(),
            PresencePhase::Open => {
                self.activate();
                if let Some(mounted) = self.mounted.borrow().as_ref() {
                    mounted.surface.show();
                }
            }
            PresencePhase::Closing | PresencePhase::Closed => {}
        }
    }
}

impl Drop for Dropdown {
    fn drop(&mut self) {
        if let Some(id) = self.resize_listener.take() {
            self.host.remove_listener(id);
        }
        self.presence.cancel();
        self.unmount_surface();
        if let Some(binding) = self.trigger.borrow_mut().take() {
            binding.unbind(&*self.host);
        }
        debug!("Dropdown {} dropped", self.content_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use crate::layout_math::{Rect, Viewport};
    use crate::primitives::Item;

    fn desktop() -> (Rc<HeadlessHost>, Rc<Dropdown>, NodeId) {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let trigger = host.add_element(Rect::new(100.0, 100.0, 120.0, 36.0));
        let dropdown = Dropdown::new(host.clone(), &Config::default(), DropdownOptions::default());
        dropdown.bind_trigger(trigger).unwrap();
        dropdown.render_content(
            ContentConfig::new(),
            vec![Item::new("One").into(), Item::new("Two").into()],
        );
        (host, dropdown, trigger)
    }

    #[test]
    fn test_open_close_cycle() {
        let (host, dropdown, trigger) = desktop();
        dropdown.open();
        assert_eq!(dropdown.phase(), PresencePhase::Opening);
        assert_eq!(host.attribute(trigger, "aria-expanded").as_deref(), Some("true"));

        host.flush_frames();
        assert_eq!(dropdown.phase(), PresencePhase::Open);

        dropdown.close();
        assert!(!dropdown.is_open());
        assert!(dropdown.presence().mounted);
        host.advance_ms(150);
        assert_eq!(dropdown.phase(), PresencePhase::Closed);
        assert!(dropdown.view().is_none());
    }

    #[test]
    fn test_close_when_closed_is_silent() {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let dropdown = Dropdown::new(
            host.clone(),
            &Config::default(),
            DropdownOptions::default().on_open_change(move |_| counter.set(counter.get() + 1)),
        );

        dropdown.close();
        assert_eq!(calls.get(), 0);
        dropdown.toggle();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_controlled_mode_waits_for_caller() {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let requests = Rc::new(RefCell::new(Vec::new()));
        let sink = requests.clone();
        let dropdown = Dropdown::new(
            host.clone(),
            &Config::default(),
            DropdownOptions::controlled(false, move |open| sink.borrow_mut().push(open)),
        );

        dropdown.open();
        assert_eq!(*requests.borrow(), vec![true]);
        assert!(!dropdown.is_open());
        assert_eq!(dropdown.phase(), PresencePhase::Closed);

        dropdown.set_controlled(Some(true));
        assert!(dropdown.is_open());
        assert_eq!(dropdown.phase(), PresencePhase::Opening);
    }

    #[test]
    fn test_second_trigger_rejected() {
        let (host, dropdown, trigger) = desktop();
        let other = host.add_element(Rect::default());
        match dropdown.bind_trigger(other) {
            Err(Error::TriggerAlreadyBound(node)) => assert_eq!(node, trigger),
            other => panic!("unexpected: {:?}", other.map(|h| h.node())),
        }
    }

    #[test]
    fn test_scope_fails_after_drop() {
        let (host, dropdown, _) = desktop();
        let scope = dropdown.scope();
        assert!(scope.describe(&MenuEntry::Separator).is_ok());

        drop(dropdown);
        assert!(matches!(scope.is_open(), Err(Error::OutsideController)));
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_item_click_selects_and_closes() {
        let (host, dropdown, _) = desktop();
        let picked = Rc::new(Cell::new(false));
        let flag = picked.clone();
        dropdown.set_entries(vec![Item::new("Pick").on_select(move || flag.set(true)).into()]);
        dropdown.open();
        host.flush_frames();

        let row = dropdown.nodes().unwrap().rows[0];
        host.click(row);

        assert!(picked.get());
        assert!(!dropdown.is_open());
    }
}
