//! Integration tests driving the schema parser, encoder and decoder
//! together through schema *text*, the way a real consumer of this
//! crate would, rather than hand-built `Schema`/`TableDef` values.

#[cfg(test)]
mod tests {
    use linearbuffers::decoder::TableView;
    use linearbuffers::encoder::Encoder;
    use linearbuffers::error::Error;
    use linearbuffers::schema::parser::parse;

    const GEOMETRY_SCHEMA: &str = r#"
        namespace geometry;

        enum Color : u8 {
            Red = 0,
            Green = 1,
            Blue = 2,
        }

        table Point {
            x: f32;
            y: f32;
        }

        table Path {
            color: Color;
            label: string;
            points: [Point];
            weights: [f64];
        }

        root Path;
    "#;

    #[test]
    fn round_trips_a_path_of_points_with_a_label_and_color() {
        let schema = parse(GEOMETRY_SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_enum("color", 2).unwrap();
        enc.set_string("label", "border").unwrap();

        enc.start_table_vector().unwrap();
        for (x, y) in [(0.0f32, 0.0f32), (1.0, 0.0), (1.0, 1.0)] {
            enc.start_table("Point").unwrap();
            enc.set_f32("x", x).unwrap();
            enc.set_f32("y", y).unwrap();
            let off = enc.end_table().unwrap();
            enc.push_table(off).unwrap();
        }
        let points_off = enc.end_vector().unwrap();
        enc.set_vector("points", points_off).unwrap();

        enc.start_scalar_vector(8).unwrap();
        for w in [0.5f64, 1.5, 2.5] {
            enc.push_f64(w).unwrap();
        }
        let weights_off = enc.end_vector().unwrap();
        enc.set_vector("weights", weights_off).unwrap();

        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        assert_eq!(view.get_int("color").unwrap(), 2);
        assert_eq!(view.get_string("label").unwrap(), Some("border"));

        let points = view.get_vector("points").unwrap().unwrap();
        assert_eq!(points.len(), 3);
        let third = points.get_table(2).unwrap();
        assert_eq!(third.get_f32("x").unwrap(), 1.0);
        assert_eq!(third.get_f32("y").unwrap(), 1.0);

        let weights = view.get_vector("weights").unwrap().unwrap();
        assert_eq!(weights.len(), 3);
        assert_eq!(weights.get_f64(1).unwrap(), 1.5);
    }

    #[test]
    fn absent_optional_fields_decode_as_absent_or_default() {
        let schema = parse(GEOMETRY_SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_string("label", "untouched").unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        assert!(!view.present("color").unwrap());
        assert_eq!(view.get_int("color").unwrap(), 0);
        assert!(!view.present("points").unwrap());
        assert!(view.get_vector("points").unwrap().is_none());
    }

    #[test]
    fn empty_table_and_empty_vector_round_trip() {
        const SCHEMA: &str = r#"
            table Empty {
            }
            table Holder {
                xs: [i32];
            }
            root Holder;
        "#;
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.start_scalar_vector(4).unwrap();
        let xs_off = enc.end_vector().unwrap();
        enc.set_vector("xs", xs_off).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        let xs = view.get_vector("xs").unwrap().unwrap();
        assert_eq!(xs.len(), 0);
        assert!(xs.is_empty());
    }

    #[test]
    fn cancelling_a_table_vector_element_drops_it_from_the_count() {
        const SCHEMA: &str = r#"
            table Item {
                v: i32;
            }
            table Bag {
                items: [Item];
            }
            root Bag;
        "#;
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.start_table_vector().unwrap();
        for i in 0..5 {
            enc.start_table("Item").unwrap();
            enc.set_int("v", i).unwrap();
            if i == 2 || i == 4 {
                enc.cancel_table().unwrap();
            } else {
                let off = enc.end_table().unwrap();
                enc.push_table(off).unwrap();
            }
        }
        let items_off = enc.end_vector().unwrap();
        enc.set_vector("items", items_off).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        let items = view.get_vector("items").unwrap().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items.get_table(0).unwrap().get_int("v").unwrap(), 0);
        assert_eq!(items.get_table(1).unwrap().get_int("v").unwrap(), 1);
        assert_eq!(items.get_table(2).unwrap().get_int("v").unwrap(), 3);
    }

    #[test]
    fn zero_length_string_round_trips() {
        const SCHEMA: &str = "table T { s: string; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_string("s", "").unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        assert_eq!(view.get_string("s").unwrap(), Some(""));
    }

    #[test]
    fn setting_a_field_twice_keeps_the_last_write() {
        const SCHEMA: &str = "table T { a: i32; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_int("a", 1).unwrap();
        enc.set_int("a", 2).unwrap();
        enc.set_int("a", 3).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let view = TableView::root(&schema, &buf).unwrap();
        assert_eq!(view.get_int("a").unwrap(), 3);
    }

    #[test]
    fn scalar_default_applies_only_when_absent() {
        const SCHEMA: &str = "table T { a: i32 = 42; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();
        let view = TableView::root(&schema, &buf).unwrap();
        assert_eq!(view.get_int("a").unwrap(), 42);

        let mut enc2 = Encoder::new(&schema);
        enc2.start_output().unwrap();
        enc2.set_int("a", 7).unwrap();
        enc2.end_table().unwrap();
        let buf2 = enc2.finish().unwrap();
        let view2 = TableView::root(&schema, &buf2).unwrap();
        assert_eq!(view2.get_int("a").unwrap(), 7);
    }

    #[test]
    fn f32_scalar_default_applies_only_when_absent() {
        const SCHEMA: &str = "table T { a: f32 = 1.5; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();
        let view = TableView::root(&schema, &buf).unwrap();
        assert_eq!(view.get_f32("a").unwrap(), 1.5);

        let mut enc2 = Encoder::new(&schema);
        enc2.start_output().unwrap();
        enc2.set_f32("a", 9.0).unwrap();
        enc2.end_table().unwrap();
        let buf2 = enc2.finish().unwrap();
        let view2 = TableView::root(&schema, &buf2).unwrap();
        assert_eq!(view2.get_f32("a").unwrap(), 9.0);
    }

    #[test]
    fn encoder_misuse_is_reported_and_sticky() {
        const SCHEMA: &str = "table T { a: i32; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        let err = enc.end_vector().unwrap_err();
        assert!(matches!(err, Error::EncoderMisuse { .. }));
        // the encoder stays poisoned: even a well-formed call now fails
        // with the same error.
        let err2 = enc.set_int("a", 1).unwrap_err();
        assert_eq!(err, err2);
    }

    #[test]
    fn truncated_and_corrupt_buffers_surface_as_decode_corrupt() {
        const SCHEMA: &str = "table T { a: i64; s: string; } root T;";
        let schema = parse(SCHEMA).unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_int("a", 99).unwrap();
        enc.set_string("s", "hi").unwrap();
        enc.end_table().unwrap();
        let mut buf = enc.finish().unwrap();

        // truncate past the string's declared length.
        buf.truncate(buf.len() - 1);
        let view = TableView::root(&schema, &buf).unwrap();
        let err = view.get_string("s").unwrap_err();
        assert!(matches!(err, Error::DecodeCorrupt { .. }));
    }
}
