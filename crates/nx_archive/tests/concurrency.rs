mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::sample;
use nx_archive::error::{Error, Result};
use nx_archive::{Archive, ArchiveOptions};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

const THREADS: usize = 8;

fn open() -> Archive {
    Archive::open(sample(), ArchiveOptions::default()).unwrap()
}

#[traced_test]
#[test]
fn concurrent_root_builds_tree_once() {
    let archive = open();
    let barrier = Barrier::new(THREADS);

    let ids = thread::scope(|s| {
        let handles = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    archive.root().map(|root| root.id())
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    });

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(archive.stats().unwrap().tree_builds, 1);
}

#[traced_test]
#[test]
fn concurrent_strings_share_one_value() {
    let archive = open();
    let barrier = Barrier::new(THREADS);

    let strings = thread::scope(|s| {
        let handles = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    archive.resolve_string(0)
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    });

    assert_eq!(&*strings[0], "hello");
    assert!(strings.iter().all(|s| Arc::ptr_eq(s, &strings[0])));
}

#[traced_test]
#[test]
fn concurrent_images_decode_once() {
    let archive = open();
    let barrier = Barrier::new(THREADS);

    let images = thread::scope(|s| {
        let handles = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    archive.resolve("image")?.image()
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    });

    assert!(images.iter().all(|i| Arc::ptr_eq(i, &images[0])));
    assert_eq!(archive.stats().unwrap().images, 1);
}

#[traced_test]
#[test]
fn dispose_while_reading() {
    let archive = open();
    let barrier = Barrier::new(THREADS + 1);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..100 {
                    // Every read either completes or observes the disposal, never anything else
                    match archive.resolve("/a/b").and_then(|b| b.integer()) {
                        Ok(value) => assert_eq!(value, 42),
                        Err(Error::Disposed) => {}
                        Err(e) => panic!("unexpected error {e:?}"),
                    }
                }
            });
        }

        barrier.wait();
        archive.dispose();
    });

    assert!(archive.is_disposed());
    assert!(matches!(archive.root(), Err(Error::Disposed)));
}
