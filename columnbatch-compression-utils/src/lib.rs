pub mod bitset;
pub mod buffer;

pub use buffer::{
    AllocError, Buffer, BufferAllocator, DirectAllocator, HeapAllocator, OwnerTag, MAX_BUFFER_SIZE,
};
