//! Scalar fields: reading, writing, defaults and serialization.

use std::rc::Rc;
use std::sync::LazyLock;

use indoc::indoc;
use insta::assert_snapshot;
use xmlbuilder::{
    ConfigError, Error, PropertyTracker, QEMU_NAMESPACE, Staged, ValidationError, Value,
    XmlBuilder, XmlClass, XmlHooks, XmlProperty,
};

static WIDGET: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("widget")
        .property(
            "name",
            XmlProperty::builder("./name").validate_cb(|_, value| match value {
                Some(Value::Str(s)) if s.is_empty() => Err("must not be empty".to_string()),
                _ => Ok(()),
            }),
        )
        .property("count", XmlProperty::builder("./count").is_int())
        .property("enabled", XmlProperty::builder("./enabled").is_bool())
        .property("active", XmlProperty::builder("./@active").is_yesno())
        .property("power", XmlProperty::builder("./@power").is_onoff())
        .prop_order(&["name", "count"])
        .build()
        .unwrap()
});

static CPU: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("cpu")
        .property(
            "model",
            XmlProperty::builder("./model")
                .default_cb(|_| Some(Value::from("qemu64")))
                .default_name("host-default"),
        )
        .build()
        .unwrap()
});

static COUNTER: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("widget")
        .property("name", XmlProperty::builder("./name"))
        .property(
            "count",
            XmlProperty::builder("./count")
                .is_int()
                .default_cb(|_| Some(Value::Int(1))),
        )
        .prop_order(&["name", "count"])
        .build()
        .unwrap()
});

static LABEL: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("label")
        .property("text", XmlProperty::builder("./text"))
        .property(
            "width",
            XmlProperty::builder("./width").is_int().default_cb(|obj| {
                let text = obj.get_str("text").ok().flatten()?;
                Some(Value::Int(text.len() as i64))
            }),
        )
        .build()
        .unwrap()
});

// ============================================================================
// Build mode
// ============================================================================

#[test]
fn fresh_object_serializes_to_nothing() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    assert!(widget.is_build());
    assert_eq!(widget.get_xml_config().unwrap(), "");
}

#[test]
fn built_object_is_indented() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("count", 1).unwrap();
    widget.set("name", "demo").unwrap();

    // prop_order wins over assignment order
    assert_eq!(
        widget.get_xml_config().unwrap(),
        indoc! {"
            <widget>
              <name>demo</name>
              <count>1</count>
            </widget>
        "}
    );
}

#[test]
fn serialization_does_not_change_the_object() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("name", "demo").unwrap();

    let first = widget.get_xml_config().unwrap();
    let second = widget.get_xml_config().unwrap();
    assert_eq!(first, second);
}

#[test]
fn provided_default_is_written_after_explicit_fields() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&COUNTER).unwrap();
    widget.set("name", "demo").unwrap();

    assert_eq!(
        widget.get_xml_config().unwrap(),
        "<widget>\n  <name>demo</name>\n  <count>1</count>\n</widget>\n"
    );
}

#[test]
fn cleared_object_serializes_like_a_fresh_one() {
    xmlbuilder_testhelpers::setup();

    let mut pristine = XmlBuilder::new(&COUNTER).unwrap();
    let mut edited = XmlBuilder::new(&COUNTER).unwrap();
    edited.set("name", "demo").unwrap();
    edited.set("count", 7).unwrap();
    edited.clear(false).unwrap();

    let expected = pristine.get_xml_config().unwrap();
    assert_eq!(expected, "<widget>\n  <count>1</count>\n</widget>\n");
    assert_eq!(edited.get_xml_config().unwrap(), expected);
}

#[test]
fn applied_defaults_are_recomputed_each_serialization() {
    xmlbuilder_testhelpers::setup();

    let mut label = XmlBuilder::new(&LABEL).unwrap();
    label.set("text", "demo").unwrap();

    let first = label.get_xml_config().unwrap();
    assert_eq!(first, "<label>\n  <text>demo</text>\n  <width>4</width>\n</label>\n");
    assert_eq!(label.get_xml_config().unwrap(), first);

    // width was never stored, so it follows the new text
    label.set("text", "ab").unwrap();
    assert_eq!(
        label.get_xml_config().unwrap(),
        "<label>\n  <text>ab</text>\n  <width>2</width>\n</label>\n"
    );
}

#[test]
fn setting_the_sentinel_matches_leaving_it_unset() {
    xmlbuilder_testhelpers::setup();

    let mut untouched = XmlBuilder::new(&CPU).unwrap();
    let mut assigned = XmlBuilder::new(&CPU).unwrap();
    assigned.set("model", "host-default").unwrap();

    assert_eq!(
        assigned.get_xml_config().unwrap(),
        untouched.get_xml_config().unwrap()
    );
}

#[test]
fn sentinel_default_resolves_at_serialization() {
    xmlbuilder_testhelpers::setup();

    let mut cpu = XmlBuilder::new(&CPU).unwrap();

    assert_eq!(cpu.get_str("model").unwrap().as_deref(), Some("host-default"));
    assert_eq!(
        cpu.get_xml_config().unwrap(),
        "<cpu>\n  <model>qemu64</model>\n</cpu>\n"
    );
    // the applied default does not stick
    assert_eq!(cpu.get_str("model").unwrap().as_deref(), Some("host-default"));

    cpu.set("model", "host-default").unwrap();
    assert_eq!(cpu.get_str("model").unwrap().as_deref(), Some("qemu64"));
}

#[test]
fn bool_and_switch_kinds() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("enabled", true).unwrap();
    widget.set("active", true).unwrap();
    widget.set("power", false).unwrap();

    assert!(widget.get_bool("enabled").unwrap());
    assert_eq!(widget.get("active").unwrap(), Some(Value::Bool(true)));
    assert_eq!(widget.get("power").unwrap(), Some(Value::Bool(false)));

    let xml = widget.get_xml_config().unwrap();
    assert!(xml.contains("<enabled/>"), "{xml}");
    assert!(xml.starts_with("<widget active=\"yes\" power=\"off\">"), "{xml}");

    widget.set("enabled", false).unwrap();
    assert!(!widget.get_xml_config().unwrap().contains("enabled"));
}

#[test]
fn switch_words_are_written_as_given() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("power", "off").unwrap();
    widget.set("active", "no").unwrap();

    assert_eq!(widget.get("power").unwrap(), Some(Value::Bool(false)));
    assert_eq!(widget.get("active").unwrap(), Some(Value::Bool(false)));
    assert_eq!(
        widget.get_xml_config().unwrap(),
        "<widget power=\"off\" active=\"no\"/>\n"
    );

    widget.set("power", "on").unwrap();
    assert_eq!(widget.get("power").unwrap(), Some(Value::Bool(true)));
}

// ============================================================================
// Parse mode
// ============================================================================

#[test]
fn parsed_values_come_from_the_document() {
    xmlbuilder_testhelpers::setup();

    let widget = XmlBuilder::parse(
        &WIDGET,
        r#"<widget active="no"><name>demo</name><count>5</count><enabled/></widget>"#,
    )
    .unwrap();

    assert!(!widget.is_build());
    assert_eq!(widget.get_str("name").unwrap().as_deref(), Some("demo"));
    assert_eq!(widget.get_int("count").unwrap(), Some(5));
    assert!(widget.get_bool("enabled").unwrap());
    assert_eq!(widget.get("active").unwrap(), Some(Value::Bool(false)));
    assert_eq!(widget.get("power").unwrap(), None);

    // no defaults for parsed objects
    let cpu = XmlBuilder::parse(&CPU, "<cpu/>").unwrap();
    assert_eq!(cpu.get("model").unwrap(), None);
}

#[test]
fn hex_integer_is_read_back_as_decimal() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::parse(&WIDGET, "<widget><count>5</count></widget>").unwrap();
    assert_eq!(widget.get("count").unwrap(), Some(Value::Int(5)));

    widget.set("count", "0x10").unwrap();
    assert_eq!(widget.get("count").unwrap(), Some(Value::Int(16)));
}

#[test]
fn unedited_document_round_trips() {
    xmlbuilder_testhelpers::setup();

    let xml = indoc! {r#"
        <widget power="on">
          <!-- hand written -->
          <name>demo</name>
          <extra keep="me"/>
        </widget>
    "#};
    let mut widget = XmlBuilder::parse(&WIDGET, xml).unwrap();
    assert_eq!(widget.get_xml_config().unwrap(), xml);
}

#[test]
fn edits_touch_only_their_node() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::parse(
        &WIDGET,
        indoc! {"
            <widget>
              <!-- hand written -->
              <name>demo</name>
              <count>5</count>
            </widget>
        "},
    )
    .unwrap();

    widget.set("count", "0x10").unwrap();
    assert_eq!(widget.get_int("count").unwrap(), Some(16));
    widget.set("enabled", true).unwrap();

    assert_eq!(
        widget.get_xml_config().unwrap(),
        indoc! {"
            <widget>
              <!-- hand written -->
              <name>demo</name>
              <count>16</count>
              <enabled/>
            </widget>
        "}
    );
}

#[test]
fn unsetting_removes_the_node() {
    xmlbuilder_testhelpers::setup();

    let mut widget =
        XmlBuilder::parse(&WIDGET, "<widget>\n  <name>demo</name>\n  <count>5</count>\n</widget>\n")
            .unwrap();
    widget.set_option("count", None).unwrap();

    assert_eq!(widget.get("count").unwrap(), None);
    assert_eq!(
        widget.get_xml_config().unwrap(),
        "<widget>\n  <name>demo</name>\n</widget>\n"
    );
}

#[test]
fn clear_resets_a_built_object() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("name", "demo").unwrap();
    widget.set("count", 3).unwrap();
    widget.clear(false).unwrap();

    assert_eq!(widget.get("count").unwrap(), None);
    assert_eq!(widget.get_xml_config().unwrap(), "");
}

#[test]
fn sanitized_class_drops_control_characters() {
    xmlbuilder_testhelpers::setup();

    static NOTE: LazyLock<XmlClass> = LazyLock::new(|| {
        XmlClass::builder("note")
            .property("text", XmlProperty::builder("./text"))
            .sanitize(true)
            .build()
            .unwrap()
    });

    let note = XmlBuilder::parse(&NOTE, "<note><text>a\u{7}b\u{e9}c</text></note>").unwrap();
    assert_eq!(note.get_str("text").unwrap().as_deref(), Some("abc"));
}

#[test]
fn prefixed_root_declares_its_namespace() {
    xmlbuilder_testhelpers::setup();

    static COMMANDLINE: LazyLock<XmlClass> = LazyLock::new(|| {
        XmlClass::builder("qemu:commandline")
            .namespace("qemu", QEMU_NAMESPACE)
            .property("env", XmlProperty::builder("./qemu:env/@name"))
            .build()
            .unwrap()
    });

    let mut cmd = XmlBuilder::new(&COMMANDLINE).unwrap();
    assert_eq!(cmd.get_xml_config().unwrap(), "");

    cmd.set("env", "FOO").unwrap();
    assert_eq!(
        cmd.get_xml_config().unwrap(),
        indoc! {r#"
            <qemu:commandline xmlns:qemu="http://libvirt.org/schemas/domain/qemu/1.0">
              <qemu:env name="FOO"/>
            </qemu:commandline>
        "#}
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn rejected_value_leaves_field_untouched() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    widget.set("name", "demo").unwrap();

    let err = widget.set("name", "").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_snapshot!(err.to_string(), @"invalid value for 'name': must not be empty");
    assert_eq!(widget.get_str("name").unwrap().as_deref(), Some("demo"));
}

#[test]
fn bad_integer_is_a_validation_error() {
    xmlbuilder_testhelpers::setup();

    let mut widget = XmlBuilder::new(&WIDGET).unwrap();
    let err = widget.set("count", "many").unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError { ref field, .. }) if field == "count"));
    assert_eq!(widget.get("count").unwrap(), None);
}

#[test]
fn unknown_field_is_a_programming_error() {
    xmlbuilder_testhelpers::setup();

    let widget = XmlBuilder::new(&WIDGET).unwrap();
    let err = widget.get("colour").unwrap_err();
    assert_eq!(err.code(), "xmlbuilder::config");
    assert_snapshot!(err.to_string(), @"programming error: <widget> has no field 'colour'");
}

#[test]
fn malformed_source_is_a_parse_error() {
    xmlbuilder_testhelpers::setup();

    let err = XmlBuilder::parse(&WIDGET, "<widget><name>").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn inconsistent_declarations_are_rejected() {
    xmlbuilder_testhelpers::setup();

    let err = XmlClass::builder("a")
        .property("x", XmlProperty::builder("./x"))
        .property("x", XmlProperty::builder("./y"))
        .build()
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"<a> declares field 'x' twice");

    let err = XmlClass::builder("a")
        .property("x", XmlProperty::builder("./x"))
        .prop_order(&["y"])
        .build()
        .unwrap_err();
    assert_snapshot!(err.to_string(), @"prop_order key 'y' of <a> is not a property");

    let err = XmlClass::builder("a")
        .property("x", XmlProperty::builder("./x").is_int().is_onoff())
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::ConflictingConverters { xpath: "./x".into() });

    let err = XmlClass::builder("ns:a").build().unwrap_err();
    assert_snapshot!(err.to_string(), @"<ns:a> uses unregistered namespace prefix 'ns'");
}

// ============================================================================
// Hooks and instrumentation
// ============================================================================

struct Stamped;

impl XmlHooks for Stamped {
    fn prepare_serialize(&self, obj: &mut XmlBuilder) -> Result<Staged, Error> {
        let previous = obj.get("stamp")?;
        obj.set("stamp", "serialized")?;
        Ok(Some(Box::new(previous)))
    }

    fn finish_serialize(&self, obj: &mut XmlBuilder, staged: Staged) {
        let previous = staged
            .and_then(|s| s.downcast::<Option<Value>>().ok())
            .and_then(|b| *b);
        let _ = obj.set_option("stamp", previous);
    }

    fn validate(&self, obj: &XmlBuilder) -> Result<(), Error> {
        if obj.get("id")?.is_none() {
            return Err(ValidationError {
                field: "id".into(),
                message: "an id is required".into(),
            }
            .into());
        }
        Ok(())
    }

    fn set_defaults(&self, obj: &mut XmlBuilder) -> Result<(), Error> {
        if obj.get("id")?.is_none() {
            obj.set("id", "generated")?;
        }
        Ok(())
    }
}

static STAMPED: LazyLock<XmlClass> = LazyLock::new(|| {
    XmlClass::builder("record")
        .property("id", XmlProperty::builder("./@id"))
        .property("stamp", XmlProperty::builder("./stamp"))
        .hooks(Stamped)
        .build()
        .unwrap()
});

#[test]
fn hooks_bracket_serialization() {
    xmlbuilder_testhelpers::setup();

    let mut record = XmlBuilder::new(&STAMPED).unwrap();
    assert!(record.validate().is_err());

    record.set_defaults().unwrap();
    record.validate().unwrap();

    assert_eq!(
        record.get_xml_config().unwrap(),
        "<record id=\"generated\">\n  <stamp>serialized</stamp>\n</record>\n"
    );
    assert_eq!(record.get("stamp").unwrap(), None);
}

#[test]
fn tracker_reports_untouched_properties() {
    xmlbuilder_testhelpers::setup();

    let tracker = Rc::new(PropertyTracker::new());
    let mut widget = XmlBuilder::new_tracked(&WIDGET, None, tracker.clone()).unwrap();
    widget.set("name", "demo").unwrap();
    widget.get("count").unwrap();

    let name = tracker.usage(&WIDGET, "name").unwrap();
    assert_eq!(name.writes, 1);
    assert_eq!(tracker.usage(&WIDGET, "count").unwrap().reads, 1);
    assert_eq!(
        tracker.unseen(),
        vec!["widget.enabled", "widget.active", "widget.power"]
    );
}

#[test]
fn copies_are_independent() {
    xmlbuilder_testhelpers::setup();

    let mut original = XmlBuilder::new(&WIDGET).unwrap();
    original.set("name", "one").unwrap();

    let mut copy = original.copy();
    assert_ne!(copy.id(), original.id());
    copy.set("name", "two").unwrap();

    assert_eq!(original.get_str("name").unwrap().as_deref(), Some("one"));
    assert_eq!(copy.get_str("name").unwrap().as_deref(), Some("two"));
}
