//! Shows how a container that only knows the provider traits reports everything it does
//! through an instrumented provider, including the nodes it reserves under another type.
//!
//! The subscriber logs everything up to `TRACE`, so copy group creation and dissolution are
//! visible.
//!
//! Run with: `cargo run --example linked_stack`

use std::ptr::NonNull;

use instrumented_provider::{InstrumentedProvider, Provider, Rebind, Result};
use tracing::Level;

struct Node<T> {
    value: Option<T>,
    next: Option<NonNull<Node<T>>>,
}

struct Stack<T, P>
where
    P: Rebind<Node<T>>,
{
    nodes: P::Rebound,
    head: Option<NonNull<Node<T>>>,
}

impl<T, P> Stack<T, P>
where
    P: Rebind<Node<T>>,
{
    fn new(provider: &P) -> Self {
        Self {
            nodes: provider.rebind(),
            head: None,
        }
    }

    fn push(&mut self, value: T) -> Result<()> {
        let ptr = self.nodes.reserve(1)?;

        // SAFETY: Storage for exactly one node was reserved above.
        unsafe {
            self.nodes.construct(
                ptr,
                Node {
                    value: Some(value),
                    next: self.head,
                },
            );
        }

        self.head = Some(ptr);
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        let mut ptr = self.head?;

        // SAFETY: Every linked node was constructed by `push()` and is exclusively ours.
        let node = unsafe { ptr.as_mut() };
        let value = node.value.take();
        self.head = node.next;

        // SAFETY: The node was constructed by `push()` and is no longer linked.
        unsafe {
            self.nodes.destroy(ptr);
        }

        // SAFETY: Reserved by `push()` with a count of one and destroyed above.
        unsafe {
            self.nodes.release(ptr, 1);
        }

        value
    }
}

impl<T, P> Drop for Stack<T, P>
where
    P: Rebind<Node<T>>,
{
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let provider = InstrumentedProvider::<String>::default();

    {
        let mut stack = Stack::<String, _>::new(&provider);

        for word in ["provider", "decorator", "copy", "group"] {
            stack.push(word.to_owned())?;
        }

        println!("After pushing four words:");
        provider.snapshot().print_to_stdout();
        println!();

        while let Some(word) = stack.pop() {
            println!("popped {word}");
        }

        println!();
    }

    println!("After the stack is gone:");
    provider.snapshot().print_to_stdout();

    Ok(())
}
