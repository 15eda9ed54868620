//! End-to-end scenarios over literal inputs.
//!
//! # Scope
//! Each test feeds a small synthesized input through the full pipeline and
//! asserts on the emitted graph: node identities, hash literals, container
//! linkage, and format dispatch.

mod common;

use common::*;

use descry::config::InspectorConfig;
use descry::format::png::synthesize_png;
use descry::hash::HashAlgorithmId;
use descry::rdf::Term;

const DIGEST_VALUE: &str = "http://www.w3.org/2000/09/xmldsig#digestValue";
const DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#digestAlgorithm";
const EXTENT: &str = "http://purl.org/dc/terms/extent";
const HAS_FORMAT: &str = "http://purl.org/dc/terms/hasFormat";
const BELONGS_TO_CONTAINER: &str =
    "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#belongsToContainer";
const ARCHIVE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Archive";
const MIME_TYPE: &str = "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#mimeType";
const WIDTH: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#width";
const HEIGHT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#height";
const IS_BINARY: &str = "http://descry.dev/vocab#isBinary";
const XML_VERSION: &str = "http://descry.dev/vocab#xmlVersion";
const ROOT_NAMESPACE: &str = "http://descry.dev/vocab#rootNamespace";
const SVG_DOCUMENT: &str = "http://descry.dev/vocab#SvgDocument";
const IMPROVISED: &str = "http://descry.dev/vocab#ImprovisedFormat";
const EXTENSION: &str = "http://descry.dev/vocab#extension";
const BASE64_BINARY: &str = "http://www.w3.org/2001/XMLSchema#base64Binary";

fn md5_identity_config() -> InspectorConfig {
    InspectorConfig {
        identity_algorithm: HashAlgorithmId::Md5,
        ..test_config()
    }
}

// S1: 3-byte file "hi\n" under an MD5 identity scheme.
#[test]
fn s1_md5_hash_uri_and_digest_literal() {
    let (_dir, run) = inspect_bytes("hi.txt", b"hi\n", md5_identity_config());

    let node = "urn:md5:764EFA883DDA1E11DB47671C4A3BBD9E";
    let digests = run.objects(node, DIGEST_VALUE);
    assert_eq!(
        digests,
        vec![Term::typed("dk76iD3aHhHbR2ccSju9ng==", BASE64_BINARY)],
        "digest literal on the content node"
    );
    assert_eq!(
        run.object_iri(node, DIGEST_ALGORITHM).as_deref(),
        Some("http://www.w3.org/2001/04/xmldsig-more#md5")
    );
    assert_eq!(run.object_literal(node, EXTENT).as_deref(), Some("3"));
    // The file node stores its content under this identity.
    let file = file_node_named(&run, "hi.txt").expect("file node");
    assert_eq!(content_node_of(&run, &file).as_deref(), Some(node));
}

// S2: ZIP with one entry hello.txt containing "hi".
#[test]
fn s2_zip_descent_links_member_to_archive() {
    let bytes = build_zip(&[("hello.txt", b"hi")]);
    let (_dir, run) = inspect_bytes("input.zip", &bytes, test_config());

    // The archive's content node carries the ZIP's own hash identity.
    let archives = run.subjects_of_type(ARCHIVE);
    assert_eq!(archives.len(), 1, "one archive node");
    let archive = &archives[0];
    assert!(archive.starts_with("ni:///sha-256;"), "hash-derived: {archive}");
    assert!(!run.objects(archive, DIGEST_VALUE).is_empty());

    let member = file_node_named(&run, "hello.txt").expect("member file node");
    assert_eq!(
        run.object_iri(&member, BELONGS_TO_CONTAINER).as_deref(),
        Some(archive.as_str())
    );

    let content = content_node_of(&run, &member).expect("member content node");
    assert_eq!(run.object_literal(&content, EXTENT).as_deref(), Some("2"));

    let format = run
        .object_iri(&content, HAS_FORMAT)
        .expect("member format node");
    assert_eq!(
        run.object_literal(&format, MIME_TYPE).as_deref(),
        Some("text/plain")
    );
    assert!(!run.report.has_failures());
}

// S3: XML format dispatch by root namespace.
#[test]
fn s3_svg_dispatch_records_version_and_namespace() {
    let svg = br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"/>"#;
    let (_dir, run) = inspect_bytes("pic.svg", svg, test_config());

    let svg_nodes = run.subjects_of_type(SVG_DOCUMENT);
    assert_eq!(svg_nodes.len(), 1);
    let node = &svg_nodes[0];
    assert_eq!(run.object_literal(node, XML_VERSION).as_deref(), Some("1.0"));
    assert_eq!(
        run.object_iri(node, ROOT_NAMESPACE).as_deref(),
        Some("http://www.w3.org/2000/svg")
    );
    assert_eq!(
        run.object_literal(node, MIME_TYPE).as_deref(),
        Some("image/svg+xml")
    );
    // The content node links to the SVG format node.
    assert!(!run.subjects_linking(HAS_FORMAT, node).is_empty());
}

// S4: unrecognized binary with a printable signature.
#[test]
fn s4_improvised_format_from_magic_bytes() {
    let (_dir, run) = inspect_bytes(
        "module.bin",
        b"WASM\0\0\x01\x02\x03\x04",
        test_config(),
    );

    let improvised = run.subjects_of_type(IMPROVISED);
    assert_eq!(improvised.len(), 1);
    let node = &improvised[0];
    assert_eq!(
        run.object_literal(node, MIME_TYPE).as_deref(),
        Some("application/x.sig.wasm")
    );
    assert_eq!(run.object_literal(node, EXTENSION).as_deref(), Some("WASM"));
    assert!(!run.subjects_linking(HAS_FORMAT, node).is_empty());
    assert_eq!(run.report.improvised_formats, 1);
}

// S5: empty file gets hashes and size but no formats.
#[test]
fn s5_empty_file_has_hashes_but_no_formats() {
    let (_dir, run) = inspect_bytes("empty", b"", test_config());

    let file = file_node_named(&run, "empty").expect("file node");
    let content = content_node_of(&run, &file).expect("content node");
    assert_eq!(run.object_literal(&content, EXTENT).as_deref(), Some("0"));
    assert_eq!(
        run.object_literal(&content, IS_BINARY).as_deref(),
        Some("false")
    );
    assert!(!run.objects(&content, DIGEST_VALUE).is_empty());
    assert!(run.objects(&content, HAS_FORMAT).is_empty());
    assert!(run.subjects_of_type(IMPROVISED).is_empty());
    assert_eq!(run.report.format_matches, 0);
}

// S6: ZIP containing a TAR containing a PNG.
#[test]
fn s6_nested_archives_reach_image_metadata() {
    let png = synthesize_png(640, 480);
    let tar = build_tar(&[("img.png", &png)]);
    let zip = build_zip(&[("inner.tar", &tar)]);
    let (_dir, run) = inspect_bytes("outer.zip", &zip, test_config());

    // Both the zip and the tar content nodes are archives.
    let archives = run.subjects_of_type(ARCHIVE);
    assert_eq!(archives.len(), 2, "zip and tar archive nodes: {archives:?}");

    // belongsToContainer chain: img.png -> tar node, inner.tar -> zip node.
    let tar_file = file_node_named(&run, "inner.tar").expect("tar member node");
    let zip_archive = run
        .object_iri(&tar_file, BELONGS_TO_CONTAINER)
        .expect("tar belongs to zip");
    let tar_archive = content_node_of(&run, &tar_file).expect("tar content node");
    assert!(archives.contains(&zip_archive));
    assert!(archives.contains(&tar_archive));

    let png_file = file_node_named(&run, "img.png").expect("png member node");
    assert_eq!(
        run.object_iri(&png_file, BELONGS_TO_CONTAINER).as_deref(),
        Some(tar_archive.as_str())
    );

    // Image metadata reachable via hasFormat under the innermost node.
    let png_content = content_node_of(&run, &png_file).expect("png content node");
    let png_format = run
        .object_iri(&png_content, HAS_FORMAT)
        .expect("png format node");
    assert_eq!(run.object_literal(&png_format, WIDTH).as_deref(), Some("640"));
    assert_eq!(run.object_literal(&png_format, HEIGHT).as_deref(), Some("480"));
    assert_eq!(
        run.object_literal(&png_format, MIME_TYPE).as_deref(),
        Some("image/png")
    );

    assert_eq!(run.report.containers, 2);
    assert!(!run.report.has_failures());
}

// Independent runs over byte-identical content mint identical
// content-addressed subgraphs.
#[test]
fn idempotent_identity_across_runs() {
    let bytes = build_zip(&[("a.txt", b"alpha"), ("b/c.txt", b"gamma")]);
    let (_d1, run1) = inspect_bytes("same.zip", &bytes, test_config());
    let (_d2, run2) = inspect_bytes("same.zip", &bytes, test_config());

    let t1 = content_triples_only(&run1);
    let t2 = content_triples_only(&run2);
    assert!(!t1.is_empty());
    assert_eq!(t1, t2, "content-addressed triples must be byte-identical");
}

// Two members with equal bytes share one fully-described content node.
#[test]
fn duplicate_members_share_one_content_node() {
    let bytes = build_zip(&[("one.txt", b"same-bytes"), ("two.txt", b"same-bytes")]);
    let (_dir, run) = inspect_bytes("dup.zip", &bytes, test_config());

    let one = file_node_named(&run, "one.txt").expect("first member");
    let two = file_node_named(&run, "two.txt").expect("second member");
    let c1 = content_node_of(&run, &one).expect("content 1");
    let c2 = content_node_of(&run, &two).expect("content 2");
    assert_eq!(c1, c2, "equal bytes, equal identity");

    // Described exactly once: one extent triple despite two references.
    assert_eq!(run.objects(&c1, EXTENT).len(), 1);
}
