//! # Etree Binding
//!
//! XML element-tree construction for scripts.
//!
//! The `etree` object creates documents; documents and elements hand out
//! further handles into one shared tree. Everything stays in memory; the
//! script serializes with `write_to_string` and does whatever it wants with
//! the result.
//!
//! ```rhai
//! let d = etree.new_document();
//! let r = d.create_element("root");
//! r.create_attr("name", "foo");
//! console.log(d.write_to_string());
//! ```

use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Engine, Scope};

use crate::etree::{ElementTree, NodeId};

/// The `etree` top-level object.
#[derive(Clone)]
pub struct Etree;

/// Handle to one document tree.
#[derive(Clone)]
pub struct DocumentHandle {
    tree: Arc<Mutex<ElementTree>>,
}

/// Handle to one element inside a document tree.
#[derive(Clone)]
pub struct ElementHandle {
    tree: Arc<Mutex<ElementTree>>,
    id: NodeId,
}

/// Register the `etree` binding.
pub fn register(engine: &mut Engine, scope: &mut Scope<'static>) {
    engine.register_type_with_name::<Etree>("Etree");
    engine.register_type_with_name::<DocumentHandle>("XmlDocument");
    engine.register_type_with_name::<ElementHandle>("XmlElement");

    engine.register_fn("new_document", |_: &mut Etree| DocumentHandle {
        tree: Arc::new(Mutex::new(ElementTree::new())),
    });

    // Document methods
    engine.register_fn("create_element", |d: &mut DocumentHandle, tag: &str| {
        let id = d.tree.lock().unwrap().create_root_element(tag);
        ElementHandle {
            tree: d.tree.clone(),
            id,
        }
    });
    engine.register_fn("select_element", |d: &mut DocumentHandle, tag: &str| {
        match d.tree.lock().unwrap().select_root(tag) {
            Some(id) => Dynamic::from(ElementHandle {
                tree: d.tree.clone(),
                id,
            }),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn("indent", |d: &mut DocumentHandle, spaces: i64| {
        d.tree.lock().unwrap().set_indent(spaces.max(0) as usize);
    });
    engine.register_fn("write_to_string", |d: &mut DocumentHandle| {
        d.tree.lock().unwrap().write_to_string()
    });

    // Element methods
    engine.register_fn("create_element", |e: &mut ElementHandle, tag: &str| {
        let id = e.tree.lock().unwrap().create_child_element(e.id, tag);
        ElementHandle {
            tree: e.tree.clone(),
            id,
        }
    });
    engine.register_fn(
        "create_attr",
        |e: &mut ElementHandle, key: &str, value: &str| {
            e.tree.lock().unwrap().create_attr(e.id, key, value);
        },
    );
    engine.register_fn("attr", |e: &mut ElementHandle, key: &str| {
        match e.tree.lock().unwrap().attr(e.id, key) {
            Some(value) => Dynamic::from(value.to_string()),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn("set_text", |e: &mut ElementHandle, text: &str| {
        e.tree.lock().unwrap().set_text(e.id, text);
    });
    engine.register_fn("text", |e: &mut ElementHandle| {
        e.tree.lock().unwrap().text(e.id)
    });
    engine.register_fn("tag", |e: &mut ElementHandle| {
        e.tree.lock().unwrap().tag(e.id).to_string()
    });
    engine.register_fn("create_comment", |e: &mut ElementHandle, text: &str| {
        e.tree.lock().unwrap().create_comment(e.id, text);
    });
    engine.register_fn("select_element", |e: &mut ElementHandle, tag: &str| {
        match e.tree.lock().unwrap().select_child(e.id, tag) {
            Some(id) => Dynamic::from(ElementHandle {
                tree: e.tree.clone(),
                id,
            }),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn("select_elements", |e: &mut ElementHandle| {
        let children = e.tree.lock().unwrap().child_elements(e.id);
        children
            .into_iter()
            .map(|id| {
                Dynamic::from(ElementHandle {
                    tree: e.tree.clone(),
                    id,
                })
            })
            .collect::<rhai::Array>()
    });

    scope.push("etree", Etree);
}
