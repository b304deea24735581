use anyhow::Result;
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prost::Message;
use rand::prelude::*;

use nnhal::convert::{aidl, v1_2};
use nnhal::{
    flatten_request, unflatten_request, Argument, DataLocation, HostPointer, Model, Operand, OperandLifetime,
    OperandType, Operation, OperationType, Request, Subgraph,
};

/// Chain of `length` ADD operations, each adding the model input to the
/// previous result
fn chain_model(length: usize) -> Model {
    let tensor = |lifetime| Operand::new(OperandType::TensorFloat32, vec![16], lifetime);
    let mut operands = vec![
        tensor(OperandLifetime::SubgraphInput),
        Operand {
            location: DataLocation { pointer: None, pool_index: 0, offset: 0, length: 4 },
            ..Operand::new(OperandType::Int32, vec![], OperandLifetime::ConstantCopy)
        },
    ];
    let mut operations = Vec::with_capacity(length);
    for index in 0..length {
        let previous = if index == 0 { 0 } else { operands.len() as u32 - 1 };
        let lifetime = if index + 1 == length {
            OperandLifetime::SubgraphOutput
        } else {
            OperandLifetime::TemporaryVariable
        };
        operands.push(tensor(lifetime));
        operations.push(Operation {
            operation_type: OperationType::Add,
            inputs: vec![previous, 0, 1],
            outputs: vec![operands.len() as u32 - 1],
        });
    }
    let output = operands.len() as u32 - 1;

    Model {
        main: Subgraph { operands, operations, input_indexes: vec![0], output_indexes: vec![output] },
        operand_values: Bytes::from_static(&[0, 0, 0, 0]),
        ..Model::default()
    }
}

fn pointer_request(inputs: &[Vec<u8>], outputs: &mut [Vec<u8>]) -> Result<Request> {
    let mut request = Request::default();
    for data in inputs {
        let pointer = unsafe { HostPointer::from_const(data.as_ptr(), data.len()) }?;
        request.inputs.push(Argument::from_pointer(pointer)?);
    }
    for data in outputs.iter_mut() {
        let pointer = unsafe { HostPointer::from_mut(data.as_mut_ptr(), data.len()) }?;
        request.outputs.push(Argument::from_pointer(pointer)?);
    }
    Ok(request)
}

fn bench_model_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_conversion");
    for length in [10, 100, 1000] {
        let model = chain_model(length);
        group.throughput(Throughput::Elements(length as u64));

        group.bench_with_input(BenchmarkId::new("v1_2_from_canonical", length), &model, |b, model| {
            b.iter(|| v1_2::validated_from_canonical::<_, nnhal::proto::v1_2::Model>(model).unwrap())
        });

        let wire: nnhal::proto::v1_2::Model = v1_2::validated_from_canonical(&model).unwrap();
        group.bench_with_input(BenchmarkId::new("v1_2_to_canonical", length), &wire, |b, wire| {
            b.iter(|| v1_2::validated_to_canonical::<_, Model>(wire).unwrap())
        });

        let wire: nnhal::proto::aidl::Model = aidl::validated_from_canonical(&model).unwrap();
        group.bench_with_input(BenchmarkId::new("aidl_to_canonical", length), &wire, |b, wire| {
            b.iter(|| aidl::validated_to_canonical::<_, Model>(wire).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("aidl_wire_round_trip", length), &wire, |b, wire| {
            b.iter(|| nnhal::proto::aidl::Model::decode(wire.encode_to_vec().as_slice()).unwrap())
        });
    }
    group.finish();
}

fn bench_request_flattening(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("request_flattening");
    for size in [64usize, 4096, 1 << 20] {
        let inputs: Vec<Vec<u8>> = (0..4).map(|_| (0..size).map(|_| rng.gen()).collect()).collect();
        let mut outputs = vec![vec![0u8; size]; 2];
        let request = pointer_request(&inputs, &mut outputs).unwrap();
        group.throughput(Throughput::Bytes((size * 6) as u64));

        group.bench_with_input(BenchmarkId::new("flatten", size), &request, |b, request| {
            b.iter(|| flatten_request(request).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("flatten_unflatten", size), &request, |b, request| {
            b.iter(|| {
                let flattened = flatten_request(request).unwrap();
                unflatten_request(request, &flattened).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_model_conversion, bench_request_flattening);
criterion_main!(benches);
