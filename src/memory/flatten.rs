use std::borrow::Cow;

use bytes::BytesMut;
use log::debug;

use crate::error::{Error, Result};
use crate::memory::shared::{create_shared_memory, MemoryView, SharedMemory};
use crate::model::{DataLocation, Model, OperandLifetime};
use crate::request::{ArgumentLifetime, MemoryPool, Request};

fn next_pool_index(pool_count: usize) -> Result<u32> {
    u32::try_from(pool_count)
        .map_err(|_| Error::InvalidArgument(format!("too many memory pools ({})", pool_count)))
}

fn checked_length(length: usize) -> Result<u32> {
    u32::try_from(length)
        .map_err(|_| Error::InvalidArgument(format!("region of {} bytes is too large", length)))
}

/// Packs constant data back to back into a new read-only pool
#[derive(Debug)]
pub struct ConstantMemoryBuilder {
    pool_index: u32,
    data: BytesMut,
    entries: usize,
}

impl ConstantMemoryBuilder {
    pub fn new(pool_index: u32) -> Self {
        Self { pool_index, data: BytesMut::new(), entries: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Stage `data` and return where it will live in the pool
    pub fn append(&mut self, data: &[u8]) -> Result<DataLocation> {
        let offset = checked_length(self.data.len())?;
        let length = checked_length(data.len())?;
        offset
            .checked_add(length)
            .ok_or_else(|| Error::InvalidArgument("constant pool exceeds 4 GiB".to_string()))?;

        self.data.extend_from_slice(data);
        self.entries += 1;
        Ok(DataLocation { pointer: None, pool_index: self.pool_index, offset, length })
    }

    pub fn finish(self) -> Result<SharedMemory> {
        let memory = create_shared_memory(self.data.len())?;
        MemoryView::new(&memory)?.write_at(0, &self.data)?;
        Ok(memory)
    }
}

/// Reserves disjoint output regions of a new writable pool
#[derive(Debug)]
pub struct MutableMemoryBuilder {
    pool_index: u32,
    size: u32,
    entries: usize,
}

impl MutableMemoryBuilder {
    pub fn new(pool_index: u32) -> Self {
        Self { pool_index, size: 0, entries: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn append(&mut self, length: u32) -> Result<DataLocation> {
        let offset = self.size;
        self.size = offset
            .checked_add(length)
            .ok_or_else(|| Error::InvalidArgument("output pool exceeds 4 GiB".to_string()))?;
        self.entries += 1;
        Ok(DataLocation { pointer: None, pool_index: self.pool_index, offset, length })
    }

    pub fn finish(self) -> Result<SharedMemory> {
        create_shared_memory(self.size as usize)
    }
}

/// Move pointer-backed operand data of a model into a shared constant pool.
///
/// A model without pointer data is borrowed unchanged.
pub fn flatten_model(model: &Model) -> Result<Cow<'_, Model>> {
    if model.has_no_pointer_data() {
        return Ok(Cow::Borrowed(model));
    }

    let mut flattened = model.clone();
    let mut constants = ConstantMemoryBuilder::new(next_pool_index(flattened.pools.len())?);
    let subgraphs = std::iter::once(&mut flattened.main).chain(flattened.referenced.iter_mut());
    for operand in subgraphs.flat_map(|subgraph| subgraph.operands.iter_mut()) {
        let Some(pointer) = operand.location.pointer else {
            continue;
        };
        let data = pointer.bytes(operand.location.length as usize)?;
        operand.lifetime = OperandLifetime::ConstantReference;
        operand.location = constants.append(data)?;
    }

    if !constants.is_empty() {
        flattened.pools.push(constants.finish()?);
    }
    Ok(Cow::Owned(flattened))
}

/// Relocate pointer-based request arguments into shared memory.
///
/// Inputs are copied into a new constant pool and outputs get regions of a
/// new writable pool, both in argument order. A request without pointer
/// arguments is borrowed unchanged and no pool is created.
pub fn flatten_request(request: &Request) -> Result<Cow<'_, Request>> {
    if request.has_no_pointer_data() {
        debug!("request has no pointer arguments; sending it as is");
        return Ok(Cow::Borrowed(request));
    }

    let mut flattened = request.clone();

    let mut inputs = ConstantMemoryBuilder::new(next_pool_index(flattened.pools.len())?);
    for input in flattened.inputs.iter_mut() {
        let Some(pointer) = input.location.pointer else {
            continue;
        };
        let data = pointer.bytes(input.location.length as usize)?;
        input.lifetime = ArgumentLifetime::Pool;
        input.location = inputs.append(data)?;
    }
    if !inputs.is_empty() {
        flattened.pools.push(MemoryPool::Memory(inputs.finish()?));
    }

    let mut outputs = MutableMemoryBuilder::new(next_pool_index(flattened.pools.len())?);
    for output in flattened.outputs.iter_mut() {
        let Some(pointer) = output.location.pointer else {
            continue;
        };
        if !pointer.is_mutable() {
            return Err(Error::InvalidArgument(
                "output argument must reference writable memory".to_string(),
            ));
        }
        // Reject lengths the caller's buffer cannot hold before anything runs
        pointer.bytes(output.location.length as usize)?;
        output.lifetime = ArgumentLifetime::Pool;
        output.location = outputs.append(output.location.length)?;
    }
    if !outputs.is_empty() {
        flattened.pools.push(MemoryPool::Memory(outputs.finish()?));
    }

    Ok(Cow::Owned(flattened))
}

/// Copy results from the output pool of `flattened` back into the pointer
/// outputs of `request`.
///
/// Every relocated output is read before any caller memory is written, so
/// a failure leaves all caller buffers untouched.
pub fn unflatten_request(request: &Request, flattened: &Request) -> Result<()> {
    let output_memory = match flattened.pools.last() {
        Some(MemoryPool::Memory(memory)) => memory,
        _ => return Ok(()),
    };
    let output_pool_index = flattened.pools.len() - 1;

    if request.outputs.len() != flattened.outputs.len() {
        return Err(Error::InternalConsistency(format!(
            "original request has {} outputs but the flattened request has {}",
            request.outputs.len(),
            flattened.outputs.len()
        )));
    }

    let mut view = None;
    let mut results = Vec::new();
    for (index, (original, relocated)) in request.outputs.iter().zip(&flattened.outputs).enumerate() {
        let Some(pointer) = original.location.pointer else {
            continue;
        };

        if relocated.lifetime != ArgumentLifetime::Pool {
            return Err(Error::InternalConsistency(format!(
                "relocated output {} has lifetime {} instead of POOL",
                index, relocated.lifetime
            )));
        }
        if relocated.location.length != original.location.length {
            return Err(Error::InternalConsistency(format!(
                "relocated output {} has length {} but the original has {}",
                index, relocated.location.length, original.location.length
            )));
        }
        if relocated.location.pool_index as usize != output_pool_index {
            return Err(Error::InternalConsistency(format!(
                "relocated output {} lives in pool {} instead of output pool {}",
                index, relocated.location.pool_index, output_pool_index
            )));
        }

        let view = match &mut view {
            Some(view) => view,
            empty => empty.insert(MemoryView::new(output_memory)?),
        };
        let mut data = vec![0u8; relocated.location.length as usize];
        view.read_at(relocated.location.offset as usize, &mut data)?;
        results.push((pointer, data));
    }

    for (pointer, data) in results {
        pointer.write(&data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostPointer;
    use crate::request::Argument;

    #[test]
    fn test_constant_builder_offsets_accumulate() {
        let mut builder = ConstantMemoryBuilder::new(2);
        assert!(builder.is_empty());
        let first = builder.append(&[1, 2, 3]).unwrap();
        let second = builder.append(&[4, 5]).unwrap();
        assert_eq!((first.pool_index, first.offset, first.length), (2, 0, 3));
        assert_eq!((second.pool_index, second.offset, second.length), (2, 3, 2));

        let memory = builder.finish().unwrap();
        assert_eq!(memory.size, 5);
        let mut contents = [0u8; 5];
        MemoryView::new(&memory).unwrap().read_at(0, &mut contents).unwrap();
        assert_eq!(contents, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_mutable_builder_reserves_disjoint_regions() {
        let mut builder = MutableMemoryBuilder::new(0);
        let first = builder.append(8).unwrap();
        let second = builder.append(4).unwrap();
        assert_eq!((first.offset, second.offset), (0, 8));
        assert!(builder.append(u32::MAX).is_err());
        assert_eq!(builder.finish().unwrap().size, 12);
    }

    fn relocated_outputs(outputs: &mut [Vec<u8>]) -> (Request, Request) {
        let outputs = outputs
            .iter_mut()
            .map(|data| {
                let pointer = unsafe { HostPointer::from_mut(data.as_mut_ptr(), data.len()) }.unwrap();
                Argument::from_pointer(pointer).unwrap()
            })
            .collect();
        let request = Request { inputs: Vec::new(), outputs, pools: Vec::new() };
        let flattened = flatten_request(&request).unwrap().into_owned();

        let Some(MemoryPool::Memory(memory)) = flattened.pools.last() else {
            panic!("expected an output pool");
        };
        let view = MemoryView::new(memory).unwrap();
        for output in &flattened.outputs {
            view.write_at(output.location.offset as usize, &vec![0x11; output.location.length as usize]).unwrap();
        }
        (request, flattened)
    }

    #[test]
    fn test_unflatten_copies_results_back() {
        let mut outputs = vec![vec![0xAAu8; 8], vec![0xAAu8; 4]];
        let (request, flattened) = relocated_outputs(&mut outputs);

        unflatten_request(&request, &flattened).unwrap();
        drop(request);

        assert_eq!(outputs, vec![vec![0x11u8; 8], vec![0x11u8; 4]]);
    }

    #[test]
    fn test_unflatten_rejects_inconsistent_outputs() {
        let corruptions: [fn(&mut Request); 4] = [
            |flattened| flattened.outputs[1].location.length = 2,
            |flattened| flattened.outputs[1].location.pool_index = 7,
            |flattened| flattened.outputs[1].lifetime = ArgumentLifetime::NoValue,
            |flattened| {
                flattened.outputs.pop();
            },
        ];

        for corrupt in corruptions {
            let mut outputs = vec![vec![0xAAu8; 8], vec![0xAAu8; 4]];
            let (request, mut flattened) = relocated_outputs(&mut outputs);
            corrupt(&mut flattened);

            let result = unflatten_request(&request, &flattened);
            drop(request);

            assert!(matches!(result, Err(Error::InternalConsistency(_))));
            // Nothing is written, not even the outputs checked before the bad one
            assert_eq!(outputs, vec![vec![0xAAu8; 8], vec![0xAAu8; 4]]);
        }
    }

    #[test]
    fn test_unflatten_without_trailing_memory_is_noop() {
        let request = Request { pools: vec![MemoryPool::Token(7)], ..Request::default() };
        assert!(unflatten_request(&request, &request).is_ok());
        assert!(unflatten_request(&Request::default(), &Request::default()).is_ok());
    }
}
