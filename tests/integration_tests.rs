use std::sync::Arc;

use domsnap::css::{font_faces_from_css, font_faces_from_sources, Rgba, StyleSource};
use domsnap::document::DropShadowFilter;
use domsnap::synth::MEASURE_CLASS;
use domsnap::{
    BoundingRect, ComputedStyle, FontFaceDecl, FontRepository, SnapshotConfig, StyleBlock, StyleNode, StyleProperty,
    VectorElement,
};

fn shadowed_box_tree() -> StyleNode {
    let style = ComputedStyle::new()
        .with(StyleProperty::BackgroundColor, "rgb(0, 0, 255)")
        .with(StyleProperty::BoxShadow, "2px 2px 4px rgba(0,0,0,0.5)");
    StyleNode::element("DIV", ComputedStyle::new(), BoundingRect::new(0.0, 0.0, 200.0, 100.0))
        .with_children(vec![StyleNode::element("DIV", style, BoundingRect::new(10.0, 10.0, 50.0, 30.0))])
}

#[tokio::test]
async fn shadowed_box_lowers_to_filter_silhouette_and_fill() {
    let fonts = FontRepository::default();
    let doc = domsnap::snapshot(&shadowed_box_tree(), &[], &fonts, &SnapshotConfig::default()).await;

    assert_eq!((doc.width, doc.height), (200.0, 100.0));
    assert_eq!(doc.elements.len(), 3, "unexpected elements: {:?}", doc.elements);
    match &doc.elements[0] {
        VectorElement::FilterDef(DropShadowFilter { id, dx, dy, std_deviation, flood_opacity, .. }) => {
            assert_eq!((*dx, *dy, *std_deviation, *flood_opacity), (2.0, 2.0, 2.0, 0.5));
            match &doc.elements[1] {
                VectorElement::Rect { rect, filter, .. } => {
                    assert_eq!(*rect, BoundingRect::new(10.0, 10.0, 50.0, 30.0));
                    assert_eq!(filter.as_deref(), Some(id.as_str()));
                }
                other => panic!("expected silhouette, got {:?}", other),
            }
        }
        other => panic!("expected filter definition, got {:?}", other),
    }
    match &doc.elements[2] {
        VectorElement::Rect { fill, filter, .. } => {
            assert_eq!(*fill, Rgba::new(0, 0, 255, 1.0));
            assert!(filter.is_none());
        }
        other => panic!("expected fill rect, got {:?}", other),
    }
    assert_eq!(doc.font_faces().count(), 0);

    let svg = doc.to_svg();
    let filter_at = svg.find("<filter").expect("filter in svg");
    let fill_at = svg.find(r#"fill="rgb(0,0,255)""#).expect("fill in svg");
    assert!(filter_at < fill_at);
}

#[test]
fn snapshot_json_deserializes() {
    let json = r#"{
        "kind": "element",
        "tag": "DIV",
        "computedStyle": { "transform": "scale(2)", "justify-content": "center" },
        "boundingRect": { "x": 5, "y": 5, "width": 100, "height": 40 },
        "children": [
            {
                "kind": "element",
                "tag": "SPAN",
                "computedStyle": { "fontSize": 12, "color": "rgb(255, 0, 0)", "fontFamily": "Inter" },
                "boundingRect": { "x": 15, "y": 10, "width": 40, "height": 14 },
                "children": [
                    { "kind": "text", "content": "a b", "boundingRect": { "x": 15, "y": 10, "width": 40, "height": 14 } }
                ]
            },
            {
                "kind": "element",
                "tag": "PRE",
                "classes": ["CodeMirror-measure"],
                "boundingRect": { "x": 0, "y": 0, "width": 1, "height": 1 },
                "children": [
                    { "kind": "text", "content": "hidden", "boundingRect": { "x": 0, "y": 0, "width": 1, "height": 1 } }
                ]
            },
            { "kind": "embeddedGraphic", "markup": "<svg/>", "boundingRect": { "x": 50, "y": 20, "width": 8, "height": 8 } }
        ]
    }"#;
    let root: StyleNode = serde_json::from_str(json).expect("parse snapshot");
    assert!(root.children[1].has_class(MEASURE_CLASS));

    let container_style = root.style().map(StyleBlock::from_style).unwrap_or_default();
    assert_eq!(container_style.transform.as_deref(), Some("scale(2)"));
    assert_eq!(container_style.justify_content.as_deref(), Some("center"));

    let config = SnapshotConfig {
        container_style,
        ..Default::default()
    };
    let doc = domsnap::synthesize(&root, &FontRepository::default(), &config);
    assert_eq!(
        doc.elements,
        vec![
            VectorElement::TextRun {
                x: 10.0,
                y: 17.0,
                text: "a\u{00A0}b".into(),
                fill: "rgb(255, 0, 0)".into(),
                font_size: 12.0,
                font_family: "Inter".into(),
            },
            VectorElement::EmbeddedGraphic {
                x: 45.0,
                y: 15.0,
                markup: "<svg/>".into(),
            },
        ]
    );
    let svg = doc.to_svg();
    assert!(svg.contains("transform:scale(2);"));
    assert!(svg.contains(r#"<g transform="translate(45 15)"><svg/></g>"#));
}

#[test]
fn filter_predicate_prunes_subtrees() {
    let root = shadowed_box_tree();
    let config = SnapshotConfig {
        filter: Some(Arc::new(|node: &StyleNode| !node.children.is_empty())),
        ..Default::default()
    };
    let doc = domsnap::synthesize(&root, &FontRepository::default(), &config);
    assert!(doc.elements.is_empty());
}

#[test]
fn font_faces_are_discovered_from_readable_sheets() {
    let css = r#"
        body { color: red; }
        @font-face {
            font-family: "Fira Code";
            src: url("fonts/fira.woff2") format("woff2"), url(fira.ttf);
        }
        @font-face { font-family: NoSource; font-weight: 400; }
    "#;
    let decls = font_faces_from_css(css, Some("https://cdn.example.com/css/site.css"));
    assert_eq!(
        decls,
        vec![FontFaceDecl::new("\"Fira Code\"", "https://cdn.example.com/css/fonts/fira.woff2")]
    );

    let sources = vec![
        StyleSource::Unreadable {
            href: "https://other.example.com/x.css".into(),
        },
        StyleSource::Readable {
            css: css.to_string(),
            base_url: Some("https://cdn.example.com/css/site.css".into()),
        },
    ];
    assert_eq!(font_faces_from_sources(&sources), decls);
}

#[tokio::test]
async fn undecodable_fonts_fall_back_to_text_runs() {
    let decls = vec![
        FontFaceDecl::new("Broken", "data:font/woff2;base64,AAAAAAAA"),
        FontFaceDecl::new("Remote", "https://fonts.example.com/remote.woff2"),
    ];
    let fonts = FontRepository::default();
    let style = ComputedStyle::new().with(StyleProperty::FontFamily, "Broken, sans-serif");
    let root = StyleNode::element("P", style, BoundingRect::new(0.0, 0.0, 80.0, 20.0))
        .with_children(vec![StyleNode::text("hello", BoundingRect::new(0.0, 0.0, 40.0, 16.0))]);

    let config = SnapshotConfig {
        text_as_path: true,
        ..Default::default()
    };
    let doc = domsnap::snapshot(&root, &decls, &fonts, &config).await;
    assert!(fonts.is_empty());
    assert!(matches!(&doc.elements[..], [VectorElement::TextRun { text, .. }] if text == "hello"));
    assert_eq!(doc.font_faces().count(), 0);
}

#[cfg(feature = "http")]
#[tokio::test]
async fn http_failures_only_drop_their_family() {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
    let addr = server.server_addr();
    let handle = std::thread::spawn(move || {
        for _ in 0..2 {
            let Ok(request) = server.recv() else { return };
            let response = if request.url().ends_with("missing.woff2") {
                tiny_http::Response::from_string("not found").with_status_code(404)
            } else {
                tiny_http::Response::from_string("not a font")
            };
            let _ = request.respond(response);
        }
    });

    let fonts = FontRepository::with_http(&domsnap::FetchConfig::default()).expect("http repository");
    let decls = vec![
        FontFaceDecl::new("Missing", format!("http://{}/missing.woff2", addr)),
        FontFaceDecl::new("Garbage", format!("http://{}/garbage.ttf", addr)),
    ];
    assert_eq!(fonts.refresh(&decls).await, 0);
    assert!(fonts.is_empty());
    handle.join().expect("server thread");
}
