use promise_shim::{
    ExternalData, ExternalDataTypes, Isolate, JsErrorCode, Persistent, Value, add_external_data, drop_external_data, has_external_data,
    try_get_from_property,
};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

/// An embedder record that counts how often it was dropped.
struct Counter {
    hits: u32,
    drops: Rc<Cell<usize>>,
}

impl ExternalData for Counter {
    const EXTERNAL_DATA_TYPE: ExternalDataTypes = ExternalDataTypes::EmbedderData;
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Shares `Counter`'s tag but is a different type.
struct Impostor;

impl ExternalData for Impostor {
    const EXTERNAL_DATA_TYPE: ExternalDataTypes = ExternalDataTypes::EmbedderData;
}

/// Carries a tag nobody else uses.
struct Untagged;

impl ExternalData for Untagged {
    const EXTERNAL_DATA_TYPE: ExternalDataTypes = ExternalDataTypes::Unknown;
}

thread_local! {
    static FINALIZED: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

fn recording_finalizer(data: Option<Box<dyn Any>>) {
    FINALIZED.with(|f| f.borrow_mut().push(data.is_some()));
    drop_external_data(data);
}

fn counter(drops: &Rc<Cell<usize>>) -> Box<Counter> {
    Box::new(Counter { hits: 0, drops: drops.clone() })
}

#[cfg(test)]
mod external_data_tests {
    use super::*;

    #[test]
    fn attached_record_is_found_and_mutable() {
        let drops = Rc::new(Cell::new(0));
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            assert!(!has_external_data::<Counter>(&cx, &obj));
            assert!(add_external_data(&cx, &obj, counter(&drops), drop_external_data).is_ok());
            assert!(has_external_data::<Counter>(&cx, &obj));

            for _ in 0..3 {
                try_get_from_property(&cx, &obj, |c: &mut Counter| c.hits += 1).unwrap();
            }
            assert_eq!(try_get_from_property(&cx, &obj, |c: &mut Counter| c.hits), Some(3));
        });
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn missing_attachment_is_none() {
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            assert!(try_get_from_property(&cx, &obj, |c: &mut Counter| c.hits).is_none());
        });
    }

    #[test]
    fn tag_mismatch_is_none() {
        let drops = Rc::new(Cell::new(0));
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            add_external_data(&cx, &obj, counter(&drops), drop_external_data).map_err(|(code, _)| code).unwrap();

            assert!(try_get_from_property(&cx, &obj, |_: &mut Untagged| ()).is_none());
            // Same tag, different type.
            assert!(try_get_from_property(&cx, &obj, |_: &mut Impostor| ()).is_none());
            assert!(has_external_data::<Counter>(&cx, &obj));
        });
    }

    #[test]
    fn nested_lookup_on_same_object_is_none() {
        let drops = Rc::new(Cell::new(0));
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            add_external_data(&cx, &obj, counter(&drops), drop_external_data).map_err(|(code, _)| code).unwrap();

            let nested = try_get_from_property(&cx, &obj, |c: &mut Counter| {
                c.hits += 1;
                has_external_data::<Counter>(&cx, &obj)
            });
            assert_eq!(nested, Some(false));
            // The outer borrow is released once the closure returns.
            assert_eq!(try_get_from_property(&cx, &obj, |c: &mut Counter| c.hits), Some(1));
        });
    }

    #[test]
    fn foreign_values_under_hidden_key_are_none() {
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            cx.set_property(&obj, cx.external_property_id(), Value::from("not external")).unwrap();
            assert!(!has_external_data::<Counter>(&cx, &obj));

            // An external object whose payload was not put there by this layer.
            let raw = cx.create_external_object(Some(Box::new(17u32) as Box<dyn Any>), None).map_err(|(code, _)| code).unwrap();
            cx.set_property(&obj, cx.external_property_id(), Value::Object(raw)).unwrap();
            assert!(!has_external_data::<Counter>(&cx, &obj));

            let empty = cx.create_external_object(None, None).map_err(|(code, _)| code).unwrap();
            cx.set_property(&obj, cx.external_property_id(), Value::Object(empty)).unwrap();
            assert!(!has_external_data::<Counter>(&cx, &obj));
        });
    }

    #[test]
    fn hidden_key_is_not_enumerated() {
        let drops = Rc::new(Cell::new(0));
        let isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            cx.set_property(&obj, "visible".into(), Value::from(1.0)).unwrap();
            add_external_data(&cx, &obj, counter(&drops), drop_external_data).map_err(|(code, _)| code).unwrap();

            assert_eq!(cx.own_property_names(&obj), vec!["visible".to_string()]);
            assert!(cx.has_own_property(&obj, &cx.external_property_id()));
        });
    }

    #[test]
    fn attach_to_non_extensible_object_returns_record() {
        FINALIZED.with(|f| f.borrow_mut().clear());
        let drops = Rc::new(Cell::new(0));
        let mut isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            cx.prevent_extensions(&obj);

            let Err((code, record)) = add_external_data(&cx, &obj, counter(&drops), recording_finalizer) else {
                panic!("attaching to a non-extensible object should fail");
            };
            assert_eq!(code, JsErrorCode::ObjectNotExtensible);
            assert_eq!(record.hits, 0);
            assert_eq!(drops.get(), 0);
            assert!(!has_external_data::<Counter>(&cx, &obj));
        });
        assert_eq!(drops.get(), 1);

        // The orphaned external object is finalized without a payload.
        isolate.collect_garbage();
        assert_eq!(isolate.live_external_objects(), 0);
        assert_eq!(drops.get(), 1);
        assert_eq!(FINALIZED.with(|f| f.borrow().clone()), vec![false]);
    }

    #[test]
    fn collected_object_finalizes_record_once() {
        FINALIZED.with(|f| f.borrow_mut().clear());
        let drops = Rc::new(Cell::new(0));
        let mut isolate = Isolate::new();
        isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            add_external_data(&cx, &obj, counter(&drops), recording_finalizer).map_err(|(code, _)| code).unwrap();
        });
        assert_eq!(isolate.live_external_objects(), 1);

        isolate.collect_garbage();
        assert_eq!(drops.get(), 1);
        assert_eq!(isolate.live_external_objects(), 0);

        isolate.collect_garbage();
        assert_eq!(drops.get(), 1);
        assert_eq!(FINALIZED.with(|f| f.borrow().clone()), vec![true]);
    }

    #[test]
    fn rooted_object_keeps_record() {
        let drops = Rc::new(Cell::new(0));
        let mut isolate = Isolate::new();
        let keep = isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            add_external_data(&cx, &obj, counter(&drops), drop_external_data).map_err(|(code, _)| code).unwrap();
            Persistent::new(&cx, Value::Object(obj))
        });

        isolate.collect_garbage();
        assert_eq!(drops.get(), 0);
        isolate.enter(|cx| {
            let obj = keep.get(&cx).unwrap().as_object().unwrap();
            assert!(has_external_data::<Counter>(&cx, &obj));
        });

        drop(keep);
        isolate.collect_garbage();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn replaced_record_is_finalized_by_next_collection() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let mut isolate = Isolate::new();
        let keep = isolate.enter(|cx| {
            let obj = cx.create_object().unwrap();
            add_external_data(&cx, &obj, counter(&first), drop_external_data).map_err(|(code, _)| code).unwrap();
            let mut replacement = counter(&second);
            replacement.hits = 10;
            add_external_data(&cx, &obj, replacement, drop_external_data).map_err(|(code, _)| code).unwrap();
            Persistent::new(&cx, Value::Object(obj))
        });

        isolate.collect_garbage();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
        isolate.enter(|cx| {
            let obj = keep.get(&cx).unwrap().as_object().unwrap();
            assert_eq!(try_get_from_property(&cx, &obj, |c: &mut Counter| c.hits), Some(10));
        });
    }

    #[test]
    fn dropping_isolate_finalizes_records() {
        let drops = Rc::new(Cell::new(0));
        {
            let isolate = Isolate::new();
            let _keep = isolate.enter(|cx| {
                let obj = cx.create_object().unwrap();
                add_external_data(&cx, &obj, counter(&drops), drop_external_data).map_err(|(code, _)| code).unwrap();
                Persistent::new(&cx, Value::Object(obj))
            });
            assert_eq!(drops.get(), 0);
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn finalizers_tolerate_missing_payload() {
        drop_external_data(None);
        FINALIZED.with(|f| f.borrow_mut().clear());
        recording_finalizer(None);
        assert_eq!(FINALIZED.with(|f| f.borrow().clone()), vec![false]);
    }
}
