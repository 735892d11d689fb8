#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{Error, Outcome, Promise, State};
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    fn pipeline(input: i32, lines: Arc<Mutex<Vec<String>>>) -> Promise<i32> {
        let (on_value, on_error, on_done) = (lines.clone(), lines.clone(), lines);
        Promise::resolve(input)
            .and_then(move |v: i32| {
                if v % 2 != 0 {
                    return Err(Error::msg("odd"));
                }
                on_value.lock().unwrap().push(format!("value = {v}"));
                Ok(v)
            })
            .catch(move |err| {
                on_error.lock().unwrap().push(format!("Error: {err}"));
                Ok::<_, Error>(0)
            })
            .finally(move || {
                on_done.lock().unwrap().push("done!".to_owned());
            })
    }

    #[test]
    fn test_pipeline_even() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let promise = pipeline(42, lines.clone());
        promise.done().wait();
        assert_eq!(*lines.lock().unwrap(), vec!["value = 42", "done!"]);
        assert_eq!(promise.wait(), Ok(42));
    }

    #[test]
    fn test_pipeline_odd() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let promise = pipeline(41, lines.clone());
        assert_eq!(promise.wait(), Ok(0));
        assert_eq!(*lines.lock().unwrap(), vec!["Error: odd", "done!"]);
    }

    #[test]
    fn test_three_level_flattening() {
        let promise = Promise::<&str>::new(|resolver| {
            resolver.resolve_with(Promise::<&str>::new(|resolver| {
                resolver.resolve_with(Promise::new(|resolver| {
                    thread::sleep(Duration::from_millis(5));
                    resolver.resolve("V");
                }))
            }))
        });
        assert_eq!(promise.wait(), Ok("V"));
        assert_eq!(promise.state(), State::Fulfilled("V"));
    }

    #[test]
    fn test_handler_returns_pending_promise() {
        let promise: Promise<String> = Promise::resolve("go").and_then(|v: &str| {
            let owned = v.to_owned();
            Promise::new(move |resolver| {
                thread::sleep(Duration::from_millis(5));
                resolver.resolve(format!("{owned} is awesome!"));
            })
        });
        assert_eq!(promise.wait(), Ok(String::from("go is awesome!")));
    }

    #[test]
    fn test_rejection_propagates_until_recovered() {
        let reason = Error::msg("failed");
        let promise: Promise<u8> = Promise::<u8>::reject(reason.clone())
            .and_then(|v: u8| Ok::<_, Error>(v + 1))
            .and_then(|v: u8| Ok::<_, Error>(v * 2));
        assert_eq!(promise.wait(), Err(reason.clone()));

        let recovered = promise
            .catch(|_| Ok::<_, Error>(7))
            .and_then(|v: u8| Ok::<_, Error>(v + 1));
        assert_eq!(recovered.wait(), Ok::<u8, Error>(8));
    }

    #[test]
    fn test_self_reference_does_not_hang() {
        let source = Promise::resolve(1);
        let returned = source.clone();
        let derived: Promise<i32> =
            source.then(move |_| returned, |err| Outcome::<i32>::Failure(err));
        assert!(derived.done().wait_timeout(Duration::from_secs(5)));
        assert_eq!(derived.wait(), Err(Error::SelfResolution));
        assert_eq!(
            derived.wait().unwrap_err().to_string(),
            "resolve with self: unsupported operation"
        );
    }

    #[test]
    fn test_async_consumers() {
        let promise = Promise::new(|resolver| {
            thread::sleep(Duration::from_millis(5));
            resolver.resolve(String::from("🍓"));
        });
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let promise = promise.clone();
                thread::spawn(move || block_on(async move { promise.await }))
            })
            .collect();
        for consumer in consumers {
            assert_eq!(
                consumer.join().expect("The consumer thread has panicked"),
                Ok(String::from("🍓"))
            );
        }
    }
}
