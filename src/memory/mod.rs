pub mod flatten;
pub mod shared;

pub use shared::{
    create_shared_memory,
    Handle,
    Memory,
    MemoryView,
    SharedMemory,
    ASHMEM_NAME,
};

pub use flatten::{
    flatten_model,
    flatten_request,
    unflatten_request,
    ConstantMemoryBuilder,
    MutableMemoryBuilder,
};
