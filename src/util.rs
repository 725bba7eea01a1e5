use chrono::Utc;

/// Unix time in milliseconds
pub type Timestamp = u64;

pub fn unixtime() -> Timestamp {
  Timestamp::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Apply `f` until the value stops changing
pub fn fixedpoint<T, F>(f: F, mut x: T) -> T
where
  T: PartialEq + Clone,
  F: Fn(T) -> T,
{
  loop {
    let next = f(x.clone());
    if next == x {
      return x;
    }
    x = next;
  }
}


// vim:ts=2 sw=2
