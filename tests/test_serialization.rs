use dqcore::{QualityFlags, ScalarValue, Value, ValueRecord};
use ndarray::Array2;

#[test]
fn test_flags_serialize_as_raw_word() {
    let flags = QualityFlags::NODATA | QualityFlags::TEST | QualityFlags::from_raw(1 << 10);
    let json = serde_json::to_string(&flags).unwrap();
    assert_eq!(json, flags.bits().to_string());
    let back: QualityFlags = serde_json::from_str(&json).unwrap();
    assert_eq!(back, flags);
}

#[test]
fn test_scalar_value_round_trip() {
    let v = ScalarValue::new(0.1, 1e-7).with_dq(QualityFlags::COMPLEX_RESULT);
    let json = serde_json::to_string(&v).unwrap();
    let back: ScalarValue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, v);
}

#[test]
fn test_value_json_shapes() {
    let scalar = Value::scalar(2.5, 0.5, QualityFlags::SATURATED);
    let json = serde_json::to_value(&scalar).unwrap();
    assert_eq!(json["n"], 2.5);
    assert_eq!(json["dq"], QualityFlags::SATURATED.bits());
    assert!(json.get("shape").is_none());

    let image = Value::from_parts(
        Array2::from_shape_fn((2, 2), |(r, c)| (r * 2 + c) as f32 / 3.0).into_dyn(),
        None,
        None,
    )
    .unwrap();
    let json = serde_json::to_value(&image).unwrap();
    assert_eq!(json["shape"], serde_json::json!([2, 2]));
    assert_eq!(json["n"].as_array().unwrap().len(), 4);
}

#[test]
fn test_value_round_trip_is_bit_exact() {
    let values = vec![
        Value::scalar(std::f32::consts::PI, 1.0 / 3.0, QualityFlags::empty()),
        Value::nominal(-0.0),
        Value::vector(
            vec![1.0e-30, 3.4e38, -7.25],
            vec![0.1, 0.2, 0.3],
            vec![
                QualityFlags::empty(),
                QualityFlags::from_raw(0xffff),
                QualityFlags::NOUNCERTAINTY,
            ],
        )
        .unwrap(),
        Value::from_parts(
            Array2::from_shape_fn((3, 2), |(r, c)| (r as f32 + 1.0) / (c as f32 + 7.0)).into_dyn(),
            Some(ndarray::arr0(0.01f32).into_dyn()),
            None,
        )
        .unwrap(),
    ];

    for v in values {
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape(), v.shape());
        for (a, b) in back.iter().zip(v.iter()) {
            assert_eq!(a.n.to_bits(), b.n.to_bits());
            assert_eq!(a.u.to_bits(), b.u.to_bits());
            assert_eq!(a.dq.bits(), b.dq.bits());
        }
    }
}

#[test]
fn test_inconsistent_record_rejected() {
    let json = r#"{"shape": [2, 2], "n": [1.0, 2.0, 3.0], "u": [0, 0, 0], "dq": [0, 0, 0]}"#;
    let result: Result<Value, _> = serde_json::from_str(json);
    assert!(result.is_err());

    let record: ValueRecord = serde_json::from_str(r#"{"n": 1.0, "u": 0.5, "dq": 3}"#).unwrap();
    let v = Value::from_record(record).unwrap();
    assert_eq!(v.as_scalar().unwrap().dq, QualityFlags::NODATA | QualityFlags::NOUNCERTAINTY);
}
