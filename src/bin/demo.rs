// Exercises the dispatch substrate the library crate provides: a few
// producer threads pushing messages and scheduling timeouts, a timer
// thread advancing the wheel, and worker threads draining the ready list.
//
// Grounded on the teacher's `examples/std_thread/src/main.rs`, which
// spawns a fixed worker count and joins them at the end; this demo adds a
// shutdown flag since, unlike that example, the workers loop on a shared
// queue rather than running once and returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dispatch_core::{Message, Runtime};

const NUM_SERVICES: u32 = 4;
const NUM_WORKERS: usize = 2;

fn main() {
    env_logger::init();

    let runtime = Arc::new(Runtime::new());
    let done = Arc::new(AtomicBool::new(false));

    for handle in 0..NUM_SERVICES {
        runtime
            .spawn_mailbox(handle)
            .expect("handle should not already be registered");
    }

    let timer_runtime = Arc::clone(&runtime);
    let timer_done = Arc::clone(&done);
    let timer_thread = thread::spawn(move || {
        while !timer_done.load(Ordering::Relaxed) {
            timer_runtime.advance_timer();
            thread::sleep(Duration::from_millis(10));
        }
    });

    let mut workers = Vec::with_capacity(NUM_WORKERS);
    for worker_id in 0..NUM_WORKERS {
        let worker_runtime = Arc::clone(&runtime);
        let worker_done = Arc::clone(&done);
        workers.push(thread::spawn(move || {
            while !worker_done.load(Ordering::Relaxed) {
                let handled = worker_runtime.run_one(|handle, msg| {
                    log::info!(
                        "worker {worker_id}: handle {handle} session {}",
                        msg.session
                    );
                });
                if !handled {
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }));
    }

    for handle in 0..NUM_SERVICES {
        runtime.send(handle, Message::response(handle as i32));
        runtime.schedule_timeout(handle, 20, 1000 + handle as i32);
    }

    thread::sleep(Duration::from_millis(500));
    done.store(true, Ordering::Relaxed);
    timer_thread.join().expect("timer thread panicked");
    for worker in workers {
        worker.join().expect("worker thread panicked");
    }

    println!("demo finished at tick {}", runtime.now());
}
