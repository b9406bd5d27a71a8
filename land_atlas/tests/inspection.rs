use land_atlas::{
    config::AtlasConfig,
    geometry::{Coordinate, Ring},
    gis::{Attributes, Feature},
    inspect::{attributes_from_value, build_popup, build_tooltip, ContentKind, POPUP_HINT},
    parcel::ParcelId,
    store::{MemoryStore, StoredLayer},
    styles::LayerStyle,
    surface::{EngineOp, HeadlessEngine, PointerEvent},
    MapView,
};
use serde_json::{json, Value};

fn attrs(v: Value) -> Attributes {
    attributes_from_value(&v)
}

fn square(offset: f64) -> Ring {
    Ring::close(vec![
        Coordinate::new(offset, 20.0),
        Coordinate::new(offset, 20.001),
        Coordinate::new(offset + 0.001, 20.001),
        Coordinate::new(offset + 0.001, 20.0),
    ])
    .unwrap()
}

fn feature(id: &str, offset: f64, attributes: Attributes) -> Feature<Ring> {
    let mut f = Feature::with_attributes(square(offset), attributes);
    f.class = Some(id.to_string());
    f
}

#[test]
fn recognized_fields_render_as_card() {
    let block = build_tooltip(&attrs(json!({"Village": "X", "Area": 5})), "Survey", None);
    assert_eq!(block.kind, ContentKind::Structured);
    let lines = block.lines();
    assert!(lines.contains(&"Village: X".to_string()));
    assert!(lines.contains(&"Area: 5".to_string()));
}

#[test]
fn unrecognized_fields_render_verbatim() {
    let block = build_tooltip(&attrs(json!({"foo": "bar"})), "", None);
    assert_eq!(block.kind, ContentKind::Generic);
    assert_eq!(block.to_text(), "foo: bar");
}

#[test]
fn any_attribute_bag_renders() {
    let bags = [
        json!({}),
        json!(null),
        json!({"a": null, "b": [], "c": {}}),
        json!({"name": null}),
        json!({"nested": {"deep": [1, {"x": null}]}}),
        json!(42),
    ];
    for bag in bags {
        let a = attrs(bag);
        let tip = build_tooltip(&a, "Layer", None);
        let pop = build_popup(&a, "Layer", Some(&a));
        assert!(!tip.to_text().is_empty());
        assert!(!tip.to_html().is_empty());
        assert_eq!(pop.lines().last().map(String::as_str), Some(POPUP_HINT));
    }
}

#[test]
fn hover_and_click_show_content_on_surface() {
    let store = MemoryStore::new(vec![StoredLayer::from_features(
        "villages",
        "Villages",
        LayerStyle::default(),
        &[
            feature("v1", 78.0, attrs(json!({"village": "Amgaon", "district": "Gondia"}))),
            feature("v2", 78.01, attrs(json!({"code": "Z9"}))),
        ],
    )]);
    let mut view = MapView::mount(HeadlessEngine::new(800, 600), AtlasConfig::default());
    spin_on::spin_on(view.reload_layers(&store));

    let handle = view.surface().handle_for(&ParcelId::from("v1")).unwrap();
    let resting = view.surface().engine().polygon(handle).unwrap().paint.clone();

    view.handle_pointer(PointerEvent::Hover(handle));
    let hovered = view.surface().engine().polygon(handle).unwrap().paint.clone();
    assert!(hovered.stroke_width > resting.stroke_width);
    let tooltip = view
        .surface()
        .engine()
        .ops()
        .iter()
        .rev()
        .find_map(|op| match op {
            EngineOp::Tooltip { text, .. } => Some(text.clone()),
            _ => None,
        })
        .unwrap();
    assert!(tooltip.contains("Village: Amgaon"));
    assert!(tooltip.contains("District: Gondia"));

    view.handle_pointer(PointerEvent::Leave(handle));
    let restored = view.surface().engine().polygon(handle).unwrap().paint.clone();
    assert_eq!(restored, resting);

    let event = view.focus_parcel(&ParcelId::from("v2")).unwrap();
    assert_eq!(event.layer_id.as_str(), "villages");
    assert_eq!(event.content.kind, ContentKind::Generic);
    assert_eq!(event.content.title.as_deref(), Some("Villages"));
    assert_eq!(event.content.hint.as_deref(), Some(POPUP_HINT));
}
