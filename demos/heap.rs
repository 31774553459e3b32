use std::io::Read;

use tagalloc::{Allocator, BlockPtr, ExplicitAllocator, FreeTracker, HeapGrow, Sbrk};

/// Waits until the user presses ENTER when the demo runs with `--step`.
/// Useful to inspect the process with `pmap` or `gdb` between steps.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break as reported by `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn print_alloc<M: HeapGrow, T: FreeTracker>(
  heap: &Allocator<M, T>,
  requested: usize,
  bp: BlockPtr,
) {
  println!(
    "Allocated {} bytes at offset {} ({:?}), {} usable",
    requested,
    bp.offset(),
    heap.payload(bp).as_ptr(),
    heap.usable_size(bp),
  );
}

/// Dumps every block between prologue and epilogue.
fn print_heap<M: HeapGrow, T: FreeTracker>(heap: &Allocator<M, T>) {
  println!("  {:>8}  {:>8}  state", "offset", "size");
  for block in heap.blocks() {
    let state = if block.allocated { "allocated" } else { "free" };
    println!("  {:>8}  {:>8}  {}", block.bp.offset(), block.size, state);
  }
  let stats = heap.check_heap().expect("heap is consistent");
  println!(
    "  heap {} bytes, {} free in {} block(s)",
    stats.heap_size, stats.free_bytes, stats.free_blocks
  );
}

fn main() -> tagalloc::Result<()> {
  env_logger::init();
  let step = std::env::args().any(|arg| arg == "--step");

  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) Bootstrap: prologue, epilogue and one 4 KiB chunk from sbrk.
  // --------------------------------------------------------------------
  let mut heap = ExplicitAllocator::init(Sbrk::new())?;
  println!("\n[1] Heap initialized at {:?}", heap.memory().base());
  print_program_break("after init");
  print_heap(&heap);
  pause(step);

  // --------------------------------------------------------------------
  // 2) Three allocations carved out of the first chunk.
  // --------------------------------------------------------------------
  println!("\n[2] Allocate 100, 200 and 32 bytes");
  let mut blocks = Vec::new();
  for size in [100, 200, 32] {
    if let Some(bp) = heap.allocate(size)? {
      print_alloc(&heap, size, bp);
      heap.payload_mut(bp)[..size].fill(0xAB);
      blocks.push(bp);
    }
  }
  print_heap(&heap);
  pause(step);

  // --------------------------------------------------------------------
  // 3) Free the first block and ask for less: the hole is reused.
  // --------------------------------------------------------------------
  heap.free(blocks[0]);
  println!("\n[3] Freed block at offset {}", blocks[0].offset());
  if let Some(bp) = heap.allocate(50)? {
    print_alloc(&heap, 50, bp);
    println!(
      "[3] Reused the freed block? {}",
      if bp == blocks[0] { "yes" } else { "no" }
    );
    blocks[0] = bp;
  }
  print_heap(&heap);
  pause(step);

  // --------------------------------------------------------------------
  // 4) Free two neighbors: they coalesce into one block.
  // --------------------------------------------------------------------
  heap.free(blocks[1]);
  heap.free(blocks[2]);
  println!("\n[4] Freed two adjacent blocks");
  print_heap(&heap);
  pause(step);

  // --------------------------------------------------------------------
  // 5) A large request grows the heap past the program break.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  if let Some(bp) = heap.allocate(64 * 1024)? {
    println!("\n[5] Allocate 64 KiB");
    print_alloc(&heap, 64 * 1024, bp);
    let bp = heap.reallocate(Some(bp), 16)?;
    println!("[5] Shrunk by reallocation to offset {:?}", bp.map(BlockPtr::offset));
  }
  print_program_break("after large alloc");
  print_heap(&heap);

  println!("\n[6] End of demo. The heap never shrinks; the OS reclaims it at exit.");
  Ok(())
}
