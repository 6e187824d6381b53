use std::cell::RefCell;
use std::rc::Rc;

use canopy_core::{
    CastAccess, ComponentRef, ConversionError, EntityId, Value, ValueType, Variable, VariableError,
};

#[test]
fn int_source_reads_as_float() {
    let source = Variable::new("hp", 40i64);
    let cast = Variable::cast(&source, ValueType::Float, CastAccess::ReadOnly).unwrap();

    assert!(cast.is_cast());
    assert_eq!(cast.guid(), source.guid());
    assert_eq!(cast.get::<f64>(), Ok(40.0));

    source.set(41i64).unwrap();
    assert_eq!(cast.value(), Ok(Value::Float(41.0)));
}

#[test]
fn registration_is_lazy() {
    let source = Variable::new("hp", 1i64);
    let cast = Variable::cast(&source, ValueType::Float, CastAccess::ReadOnly).unwrap();
    assert_eq!(source.listener_count(), 0);

    cast.value().unwrap();
    assert_eq!(source.listener_count(), 1);

    cast.value().unwrap();
    assert_eq!(source.listener_count(), 1);

    drop(cast);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn write_through_converts_back_to_the_source() {
    let source = Variable::new("hp", 10i64);
    let cast = Variable::cast(&source, ValueType::Float, CastAccess::ReadWrite).unwrap();

    cast.set(7.6f64).unwrap();
    assert_eq!(source.get::<i64>(), Ok(7));

    // Reading back reconverts what the source actually stored.
    let back = cast.value().unwrap();
    assert_eq!(back.convert_to(ValueType::Int).ok(), source.value().ok());
}

#[test]
fn read_only_adapter_rejects_writes() {
    let source = Variable::new("hp", 10i64);
    let cast = Variable::cast(&source, ValueType::Float, CastAccess::ReadOnly).unwrap();

    assert_eq!(cast.set(1.0f64), Err(VariableError::ReadOnly(source.guid())));
    assert_eq!(source.get::<i64>(), Ok(10));
}

#[test]
fn component_reads_as_its_entity_but_not_back() {
    let source = Variable::new("body", ComponentRef::new(EntityId(12), "Rigidbody"));

    let read = Variable::cast(&source, ValueType::Entity, CastAccess::ReadOnly).unwrap();
    assert_eq!(read.get::<EntityId>(), Ok(EntityId(12)));

    let err = Variable::cast(&source, ValueType::Entity, CastAccess::ReadWrite).unwrap_err();
    assert_eq!(err, ConversionError::new(ValueType::Entity, ValueType::Component));
}

#[test]
fn incompatible_types_fail_at_construction() {
    let source = Variable::new("pos", [1.0f32, 2.0]);
    let err = Variable::cast(&source, ValueType::Bool, CastAccess::ReadOnly).unwrap_err();
    assert_eq!(err, ConversionError::new(ValueType::Vec2, ValueType::Bool));
}

#[test]
fn subscribers_receive_converted_values() {
    let source = Variable::new("pos", [1.0f32, 2.0, 3.0]);
    let flat = Variable::cast(&source, ValueType::Vec2, CastAccess::ReadWrite).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    flat.subscribe(move |v| sink.borrow_mut().push(v.clone())).unwrap();

    source.set([4.0f32, 5.0, 6.0]).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Vec2([4.0, 5.0])]);

    flat.set([7.0f32, 8.0]).unwrap();
    assert_eq!(source.get::<[f32; 3]>(), Ok([7.0, 8.0, 0.0]));
}

#[test]
fn duplicated_adapter_wraps_an_independent_source() {
    let source = Variable::new("hp", 3i64);
    let cast = Variable::cast(&source, ValueType::Float, CastAccess::ReadWrite).unwrap();
    let copy = cast.duplicate();

    copy.set(9.0f64).unwrap();
    assert_eq!(source.get::<i64>(), Ok(3));
    assert_eq!(copy.cast_source().unwrap().get::<i64>(), Ok(9));
}
