//! Nested objects: singletons, collections, and moving children in and out.

use std::sync::LazyLock;

use indoc::indoc;
use insta::assert_snapshot;
use xmlbuilder::{ClassRef, XmlBuilder, XmlChildProperty, XmlClass, XmlProperty, same_class};

fn disk() -> ClassRef {
    &DISK
}

fn cpu() -> ClassRef {
    &CPU
}

fn mouse() -> ClassRef {
    &MOUSE
}

fn tablet() -> ClassRef {
    &TABLET
}

static DISK: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("disk")
        .property("kind", XmlProperty::builder("./@type"))
        .property("source", XmlProperty::builder("./source/@file"))
        .prop_order(&["kind", "source"])
        .build()
        .unwrap()
});

static CPU: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("cpu")
        .property("mode", XmlProperty::builder("./@mode"))
        .build()
        .unwrap()
});

static MOUSE: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("mouse")
        .property("bus", XmlProperty::builder("./@bus"))
        .build()
        .unwrap()
});

static TABLET: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("tablet")
        .property("bus", XmlProperty::builder("./@bus"))
        .build()
        .unwrap()
});

static DOMAIN: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("domain")
        .property("name", XmlProperty::builder("./name"))
        .child("cpu", XmlChildProperty::builder(&[cpu]).single())
        .child(
            "disks",
            XmlChildProperty::builder(&[disk]).relative_xpath("./devices"),
        )
        .child(
            "inputs",
            XmlChildProperty::builder(&[mouse, tablet]).relative_xpath("./devices"),
        )
        .prop_order(&["name", "cpu", "disks", "inputs"])
        .build()
        .unwrap()
});

const TWO_DISKS: &str = indoc! {r#"
    <domain>
      <name>vm</name>
      <cpu mode="host"/>
      <devices>
        <disk type="file">
          <source file="/a.img"/>
        </disk>
        <disk type="block">
          <source file="/dev/sdb"/>
        </disk>
      </devices>
    </domain>
"#};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn parse_creates_children_for_existing_nodes() {
    xmlbuilder_testhelpers::setup();

    let domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();

    let disks = domain.children("disks").unwrap();
    assert_eq!(disks.len(), 2);
    assert_eq!(disks[0].get_root_xpath(), "./devices/disk[1]");
    assert_eq!(disks[1].get_root_xpath(), "./devices/disk[2]");
    assert_eq!(disks[1].get_str("kind").unwrap().as_deref(), Some("block"));
    assert_eq!(
        disks[1].get_str("source").unwrap().as_deref(),
        Some("/dev/sdb")
    );

    let cpu = domain.child("cpu").unwrap();
    assert_eq!(cpu.get_root_xpath(), "./cpu");
    assert_eq!(cpu.get_str("mode").unwrap().as_deref(), Some("host"));

    assert!(domain.children("inputs").unwrap().is_empty());
}

#[test]
fn child_classes_are_looked_up_across_fields() {
    xmlbuilder_testhelpers::setup();

    let domain = XmlBuilder::parse(
        &DOMAIN,
        r#"<domain><devices><tablet bus="usb"/><disk/></devices></domain>"#,
    )
    .unwrap();

    let tablets = domain.list_children_for_class(&TABLET);
    assert_eq!(tablets.len(), 1);
    assert_eq!(tablets[0].get_root_xpath(), "./devices/tablet[1]");
    assert!(domain.list_children_for_class(&MOUSE).is_empty());

    assert!(domain.child_class_is_singleton(&CPU).unwrap());
    assert!(!domain.child_class_is_singleton(&DISK).unwrap());
}

#[test]
fn relative_xpath_interpolates_sibling_fields() {
    xmlbuilder_testhelpers::setup();

    fn entry() -> ClassRef {
        &ENTRY
    }
    static ENTRY: LazyLock<XmlClass> = LazyLock::new(|| {
        XmlClass::builder("entry")
            .property("value", XmlProperty::builder("."))
            .build()
            .unwrap()
    });
    static STORE: LazyLock<XmlClass> = LazyLock::new(|| {
        XmlClass::builder("store")
            .property("kind", XmlProperty::builder("./@kind"))
            .child(
                "entries",
                XmlChildProperty::builder(&[entry]).relative_xpath("./list[@kind='%(kind)s']"),
            )
            .build()
            .unwrap()
    });

    let store = XmlBuilder::parse(
        &STORE,
        r#"<store kind="a"><list kind="a"><entry>1</entry><entry>2</entry></list><list kind="b"><entry>3</entry></list></store>"#,
    )
    .unwrap();

    let values: Vec<_> = store
        .children("entries")
        .unwrap()
        .iter()
        .map(|e| e.get_str("value").unwrap().unwrap_or_default())
        .collect();
    assert_eq!(values, ["1", "2"]);
}

// ============================================================================
// Building
// ============================================================================

#[test]
fn built_children_serialize_in_place() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::new(&DOMAIN).unwrap();
    domain.set("name", "vm").unwrap();
    domain
        .child_mut("cpu")
        .unwrap()
        .set("mode", "host-passthrough")
        .unwrap();

    let disk = domain.add_new("disks").unwrap();
    assert!(disk.is_build());
    assert_eq!(disk.get_root_xpath(), "./devices/disk[1]");
    disk.set("kind", "file").unwrap();
    disk.set("source", "/a.img").unwrap();

    assert_eq!(
        domain.get_xml_config().unwrap(),
        indoc! {r#"
            <domain>
              <name>vm</name>
              <cpu mode="host-passthrough"/>
              <devices>
                <disk type="file">
                  <source file="/a.img"/>
                </disk>
              </devices>
            </domain>
        "#}
    );
}

#[test]
fn collection_keeps_class_priority() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::new(&DOMAIN).unwrap();
    domain
        .add_child(XmlBuilder::new(&TABLET).unwrap())
        .unwrap()
        .set("bus", "usb")
        .unwrap();
    domain
        .add_child(XmlBuilder::new(&MOUSE).unwrap())
        .unwrap()
        .set("bus", "ps2")
        .unwrap();

    let inputs = domain.children("inputs").unwrap();
    assert!(same_class(inputs[0].class(), &MOUSE));
    assert!(same_class(inputs[1].class(), &TABLET));
    assert_eq!(inputs[0].get_root_xpath(), "./devices/mouse[1]");
    assert_eq!(inputs[1].get_root_xpath(), "./devices/tablet[1]");

    assert_eq!(
        domain.get_xml_config().unwrap(),
        indoc! {r#"
            <domain>
              <devices>
                <mouse bus="ps2"/>
                <tablet bus="usb"/>
              </devices>
            </domain>
        "#}
    );
}

#[test]
fn undeclared_child_class_is_rejected() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::new(&DOMAIN).unwrap();
    let err = domain.add_child(XmlBuilder::new(&CPU).unwrap()).unwrap_err();
    assert_snapshot!(err.to_string(), @"programming error: <domain> has no child property for <cpu>");
}

// ============================================================================
// Editing parsed documents
// ============================================================================

#[test]
fn child_edits_land_in_the_parent_document() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    domain.children_mut("disks").unwrap()[1]
        .set("source", "/dev/sdc")
        .unwrap();

    assert_eq!(
        domain.get_xml_config().unwrap(),
        TWO_DISKS.replace("/dev/sdb", "/dev/sdc")
    );
}

#[test]
fn parsed_child_is_spliced_with_indentation() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    let extra = XmlBuilder::parse(
        &DISK,
        "<disk type=\"network\">\n  <source file=\"x\"/>\n</disk>\n",
    )
    .unwrap();

    let added = domain.add_child(extra).unwrap();
    assert!(!added.is_build());
    assert_eq!(added.get_root_xpath(), "./devices/disk[3]");
    assert_eq!(added.get_str("kind").unwrap().as_deref(), Some("network"));

    assert_eq!(
        domain.get_xml_config().unwrap(),
        indoc! {r#"
            <domain>
              <name>vm</name>
              <cpu mode="host"/>
              <devices>
                <disk type="file">
                  <source file="/a.img"/>
                </disk>
                <disk type="block">
                  <source file="/dev/sdb"/>
                </disk>
                <disk type="network">
                  <source file="x"/>
                </disk>
              </devices>
            </domain>
        "#}
    );
}

#[test]
fn removed_child_keeps_its_data() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    let first = domain.children("disks").unwrap()[0].id();

    let mut removed = domain.remove_child(first).unwrap().unwrap();
    assert_eq!(removed.get_root_xpath(), "");
    assert_eq!(removed.get_str("source").unwrap().as_deref(), Some("/a.img"));
    assert_eq!(
        removed.get_xml_config().unwrap(),
        "<disk type=\"file\">\n      <source file=\"/a.img\"/>\n    </disk>\n"
    );

    // the remaining sibling is renumbered
    let disks = domain.children("disks").unwrap();
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].get_root_xpath(), "./devices/disk[1]");
    assert_eq!(disks[0].get_str("kind").unwrap().as_deref(), Some("block"));

    assert_eq!(
        domain.get_xml_config().unwrap(),
        indoc! {r#"
            <domain>
              <name>vm</name>
              <cpu mode="host"/>
              <devices>
                <disk type="block">
                  <source file="/dev/sdb"/>
                </disk>
              </devices>
            </domain>
        "#}
    );

    assert!(domain.remove_child(first).unwrap().is_none());
}

#[test]
fn cleared_member_leaves_an_empty_element() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    domain.children_mut("disks").unwrap()[0].clear(false).unwrap();

    assert_eq!(
        domain.get_xml_config().unwrap(),
        indoc! {r#"
            <domain>
              <name>vm</name>
              <cpu mode="host"/>
              <devices>
                <disk>
                </disk>
                <disk type="block">
                  <source file="/dev/sdb"/>
                </disk>
              </devices>
            </domain>
        "#}
    );
    let second = &domain.children("disks").unwrap()[1];
    assert_eq!(second.get_str("kind").unwrap().as_deref(), Some("block"));
}

#[test]
fn clearing_a_bare_member_keeps_its_siblings() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(
        &DOMAIN,
        r#"<domain><devices><disk type="file"/><disk type="block"><source file="/b"/></disk></devices></domain>"#,
    )
    .unwrap();
    domain.children_mut("disks").unwrap()[0].clear(false).unwrap();

    let disks = domain.children("disks").unwrap();
    assert_eq!(disks.len(), 2);
    assert_eq!(disks[1].get_str("kind").unwrap().as_deref(), Some("block"));
    assert_eq!(disks[1].get_str("source").unwrap().as_deref(), Some("/b"));
    assert_eq!(
        domain.get_xml_config().unwrap(),
        "<domain><devices><disk>\n    </disk><disk type=\"block\"><source file=\"/b\"/></disk></devices></domain>\n"
    );
}

#[test]
fn unsetting_a_members_last_field_keeps_the_member() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(
        &DOMAIN,
        r#"<domain><devices><disk type="file"/><disk type="block"><source file="/b"/></disk></devices></domain>"#,
    )
    .unwrap();
    let disks = domain.children_mut("disks").unwrap();
    disks[0].set_option("kind", None).unwrap();
    disks[1].set("source", "/x").unwrap();

    assert_eq!(
        domain.get_xml_config().unwrap(),
        "<domain><devices><disk/><disk type=\"block\"><source file=\"/x\"/></disk></devices></domain>\n"
    );
    assert_eq!(domain.children("disks").unwrap().len(), 2);
}

#[test]
fn removing_a_middle_member_renumbers_the_rest() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(
        &DOMAIN,
        concat!(
            "<domain><devices>",
            r#"<disk type="file"><source file="/a"/></disk>"#,
            r#"<disk type="block"><source file="/b"/></disk>"#,
            r#"<disk type="network"><source file="/c"/></disk>"#,
            "</devices></domain>",
        ),
    )
    .unwrap();
    let live_before = domain.state().api().borrow().document().live_nodes();
    let middle = domain.children("disks").unwrap()[1].id();

    let removed = domain.remove_child(middle).unwrap().unwrap();
    assert_eq!(removed.get_str("source").unwrap().as_deref(), Some("/b"));

    let disks = domain.children("disks").unwrap();
    let paths: Vec<_> = disks.iter().map(|d| d.get_root_xpath()).collect();
    assert_eq!(paths, ["./devices/disk[1]", "./devices/disk[2]"]);
    let sources: Vec<_> = disks
        .iter()
        .map(|d| d.get_str("source").unwrap().unwrap_or_default())
        .collect();
    assert_eq!(sources, ["/a", "/c"]);

    // the disk element and its source are freed, not just unlinked
    let live_after = domain.state().api().borrow().document().live_nodes();
    assert_eq!(live_after + 2, live_before);

    assert_eq!(
        domain.get_xml_config().unwrap(),
        concat!(
            "<domain><devices>",
            r#"<disk type="file"><source file="/a"/></disk>"#,
            r#"<disk type="network"><source file="/c"/></disk>"#,
            "</devices></domain>\n",
        )
    );
}

#[test]
fn clearing_the_parent_drops_every_child() {
    xmlbuilder_testhelpers::setup();

    let mut domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    domain.clear(false).unwrap();

    assert!(domain.children("disks").unwrap().is_empty());
    assert_eq!(domain.get("name").unwrap(), None);
    assert_eq!(domain.child("cpu").unwrap().get("mode").unwrap(), None);
    let xml = domain.get_xml_config().unwrap();
    assert!(!xml.contains("disk"), "{xml}");
    assert!(!xml.contains("cpu"), "{xml}");
}

#[test]
fn copied_parent_copies_its_children() {
    xmlbuilder_testhelpers::setup();

    let domain = XmlBuilder::parse(&DOMAIN, TWO_DISKS).unwrap();
    let mut copy = domain.copy();

    let original_ids: Vec<_> = domain.children("disks").unwrap().iter().map(|d| d.id()).collect();
    let copied_ids: Vec<_> = copy.children("disks").unwrap().iter().map(|d| d.id()).collect();
    assert_ne!(original_ids, copied_ids);

    copy.children_mut("disks").unwrap()[0].set("kind", "block").unwrap();
    assert_eq!(
        domain.children("disks").unwrap()[0].get_str("kind").unwrap().as_deref(),
        Some("file")
    );
}
