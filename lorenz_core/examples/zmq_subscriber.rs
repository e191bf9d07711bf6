//! ZMQ Subscriber - watch a running Processor from another process
//! ===============================================================
//!
//! Connects a SUB socket to the Processor's address and prints each frame.
//! Start the pipeline first:
//! ```bash
//! cargo run -p lorenz_sim --features zmq -- --transport zmq --steps 100000
//! cargo run --example zmq_subscriber -p lorenz_core --features zmq -- tcp://127.0.0.1:5555
//! ```

use lorenz_core::FrameLayout;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:5555".to_string());
    let dimension: usize = std::env::args()
        .nth(2)
        .map(|d| d.parse())
        .transpose()?
        .unwrap_or(3);

    let context = zmq::Context::new();
    let socket = context.socket(zmq::SUB)?;
    socket.connect(&address)?;
    socket.set_subscribe(b"")?;
    println!("Listening on {} ({} components per frame)", address, dimension);

    let layout = FrameLayout::new(dimension);
    loop {
        let bytes = socket.recv_bytes(0)?;
        match layout.decode(&bytes) {
            Ok(frame) => println!("frame {:>5}  {:?}", frame.frame_number, frame.components),
            Err(e) => eprintln!("skipping message: {}", e),
        }
    }
}
