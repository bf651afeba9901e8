// src/engine/memory.rs
//
// Byte-weighted backpressure and container memory limit detection.
//
// Every command acquires a permit sized from its decoded footprint before any pixel
// buffer is allocated. The budget comes from cgroup v1/v2 limits (or system memory)
// minus a reserve, so a burst of large images queues instead of getting OOM-killed.

use crate::command::Command;
use crate::engine::decoder::read_header;
use crate::engine::pipeline::calc_resize_dimensions;
use crate::engine::raster::CHANNELS;
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::sync::Arc;

/// Minimum memory to reserve for system and other processes (in bytes)
const MIN_RESERVED_MEMORY: u64 = 64 * 1024 * 1024; // 64MB for tiny containers
const MAX_RESERVED_MEMORY: u64 = 512 * 1024 * 1024; // cap for large hosts

/// Lower bound for any estimate so tiny images still count against the budget.
const MIN_ESTIMATE_BYTES: u64 = 4 * 1024 * 1024;

/// Codec scratch space on top of the raw pixel buffers (heuristic)
const CODEC_OVERHEAD_BYTES: u64 = 8 * 1024 * 1024;

/// Budget used when neither cgroups nor the OS report a limit.
pub const FALLBACK_MEMORY_BUDGET: u64 = 1536 * 1024 * 1024;

/// In-memory weighted semaphore for byte-based backpressure
#[derive(Debug)]
pub struct WeightedSemaphore {
    capacity: u64,
    state: Mutex<u64>, // available bytes
    cvar: Condvar,
}

#[derive(Debug)]
pub struct MemoryPermit {
    sem: Arc<WeightedSemaphore>,
    weight: u64,
}

impl MemoryPermit {
    pub fn weight(&self) -> u64 {
        self.weight
    }
}

impl WeightedSemaphore {
    pub fn new(capacity: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(capacity),
            cvar: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available(&self) -> u64 {
        *self.state.lock()
    }

    /// Block until `weight` bytes are free. Weights above capacity are clamped so a
    /// single huge request runs alone instead of deadlocking.
    pub fn acquire(self: &Arc<Self>, weight: u64) -> MemoryPermit {
        let mut available = self.state.lock();
        let need = weight.min(self.capacity);
        while *available < need {
            self.cvar.wait(&mut available);
        }
        *available -= need;
        MemoryPermit {
            sem: Arc::clone(self),
            weight: need,
        }
    }

    pub fn try_acquire(self: &Arc<Self>, weight: u64) -> Option<MemoryPermit> {
        let mut available = self.state.lock();
        let need = weight.min(self.capacity);
        if *available < need {
            return None;
        }
        *available -= need;
        Some(MemoryPermit {
            sem: Arc::clone(self),
            weight: need,
        })
    }

    fn release(&self, weight: u64) {
        let mut available = self.state.lock();
        *available = (*available).saturating_add(weight).min(self.capacity);
        // Waiters have heterogeneous weights; notify_one can starve the small ones.
        self.cvar.notify_all();
    }
}

impl Drop for MemoryPermit {
    fn drop(&mut self) {
        self.sem.release(self.weight);
    }
}

fn compute_reserved_memory(total_bytes: u64) -> u64 {
    (total_bytes / 10).clamp(MIN_RESERVED_MEMORY, MAX_RESERVED_MEMORY)
}

/// Usable budget derived from a detected limit.
pub fn budget_from_available(available: Option<u64>) -> u64 {
    match available {
        Some(mem) => {
            let usable = mem.saturating_sub(compute_reserved_memory(mem));
            usable.max(MIN_ESTIMATE_BYTES)
        }
        None => FALLBACK_MEMORY_BUDGET,
    }
}

/// Default engine budget: detected memory minus a reserve.
pub fn default_memory_budget() -> u64 {
    budget_from_available(detect_available_memory())
}

fn raster_bytes(width: u32, height: u32) -> u64 {
    (width as u64)
        .saturating_mul(height as u64)
        .saturating_mul(CHANNELS as u64)
}

/// Decoded footprint of one input, or `None` when the header cannot be read.
fn input_footprint(bytes: &[u8]) -> Option<(u32, u32, u64)> {
    read_header(bytes)
        .ok()
        .map(|(w, h, _)| (w, h, raster_bytes(w, h)))
}

/// Peak bytes a command is expected to hold: decoded input(s), intermediate and output
/// buffers, plus codec scratch. Unreadable headers fall back to the minimum since the
/// decode will fail before allocating. Caller-supplied sizes never overflow the sum.
pub fn estimate_command_bytes(command: &Command) -> u64 {
    let peak = match command {
        // a valid crop is never larger than its source
        Command::CropImage { data, spec } => input_footprint(data).map(|(_, _, decoded)| {
            decoded.saturating_add(raster_bytes(spec.width, spec.height).min(decoded))
        }),
        Command::ResizeImage { data, spec } => input_footprint(data).map(|(w, h, decoded)| {
            let (tw, th) = if spec.maintain_aspect_ratio {
                calc_resize_dimensions(w, h, spec.target_width, spec.target_height)
                    .unwrap_or((spec.target_width, spec.target_height))
            } else {
                (spec.target_width, spec.target_height)
            };
            decoded.saturating_add(raster_bytes(tw, th))
        }),
        Command::ConvertImage { data, .. } => input_footprint(data)
            // flattened RGB copy for JPEG/BMP
            .map(|(_, _, decoded)| decoded.saturating_add(decoded / 4 * 3)),
        Command::CompareImages { first, second } => {
            match (input_footprint(first), input_footprint(second)) {
                (Some((w1, h1, a)), Some((w2, h2, b))) => {
                    let larger = raster_bytes(w1.max(w2), h1.max(h2));
                    // stretched copy of the smaller input plus the diff output
                    Some(a.saturating_add(b).saturating_add(larger.saturating_mul(2)))
                }
                (Some((_, _, a)), None) | (None, Some((_, _, a))) => Some(a),
                (None, None) => None,
            }
        }
        Command::GetImageInfo { data } => input_footprint(data).map(|(_, _, decoded)| decoded),
    };

    peak.map(|bytes| bytes.saturating_add(CODEC_OVERHEAD_BYTES))
        .unwrap_or(MIN_ESTIMATE_BYTES)
        .max(MIN_ESTIMATE_BYTES)
}

/// Detects available memory from container limits or system memory
///
/// Returns available memory in bytes, or None if detection fails.
pub fn detect_available_memory() -> Option<u64> {
    detect_cgroup_v2_memory()
        .or_else(detect_cgroup_v1_memory)
        .or_else(detect_system_memory)
}

fn detect_cgroup_v2_memory() -> Option<u64> {
    let mountinfo = fs::read_to_string("/proc/self/mountinfo").ok();
    let mount = mountinfo
        .as_deref()
        .and_then(parse_cgroup2_mount_point)
        .unwrap_or_else(|| CgroupMount {
            mount_point: "/sys/fs/cgroup".to_string(),
            root: "/".to_string(),
        });

    let rel_path = fs::read_to_string("/proc/self/cgroup")
        .ok()
        .and_then(|c| parse_cgroup2_relative_path(&c))
        .unwrap_or_default();

    let rel = strip_mount_root(&mount.root, &rel_path);
    let path = join_mount_rel_file(&mount.mount_point, &rel, "memory.max");
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed == "max" {
        return None;
    }
    trimmed.parse::<u64>().ok()
}

fn detect_cgroup_v1_memory() -> Option<u64> {
    let mountinfo = fs::read_to_string("/proc/self/mountinfo").ok();
    let mount = mountinfo
        .as_deref()
        .and_then(|m| parse_cgroup1_mount_point(m, "memory"))
        .unwrap_or_else(|| CgroupMount {
            mount_point: "/sys/fs/cgroup/memory".to_string(),
            root: "/".to_string(),
        });

    let rel_path = fs::read_to_string("/proc/self/cgroup")
        .ok()
        .as_deref()
        .and_then(parse_cgroup1_memory_relative_path)
        .unwrap_or_default();

    let rel = strip_mount_root(&mount.root, &rel_path);
    let path = join_mount_rel_file(&mount.mount_point, &rel, "memory.limit_in_bytes");
    let memory = fs::read_to_string(path).ok()?.trim().parse::<u64>().ok()?;
    // Values near 2^63 mean "no limit"
    if memory > 1_000_000_000_000_000 {
        return None;
    }
    Some(memory)
}

fn detect_system_memory() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let content = fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_total(&content)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[derive(Debug, PartialEq, Eq)]
struct CgroupMount {
    mount_point: String,
    root: String,
}

fn parse_cgroup2_mount_point(mountinfo: &str) -> Option<CgroupMount> {
    // fields: id parent major:minor root mountpoint opts ... - fstype ...
    // 36 27 0:31 / /sys/fs/cgroup rw,relatime - cgroup2 cgroup2 rw
    mountinfo.lines().find_map(|line| {
        let (pre, post) = line.split_once(" - ")?;
        if !post.starts_with("cgroup2") {
            return None;
        }
        let fields: Vec<&str> = pre.split_whitespace().collect();
        (fields.len() >= 5).then(|| CgroupMount {
            root: fields[3].to_string(),
            mount_point: fields[4].to_string(),
        })
    })
}

fn parse_cgroup1_mount_point(mountinfo: &str, controller: &str) -> Option<CgroupMount> {
    mountinfo.lines().find_map(|line| {
        let (pre, post) = line.split_once(" - ")?;
        if !(post.starts_with("cgroup ") && post.contains(controller)) {
            return None;
        }
        let fields: Vec<&str> = pre.split_whitespace().collect();
        (fields.len() >= 5).then(|| CgroupMount {
            root: fields[3].to_string(),
            mount_point: fields[4].to_string(),
        })
    })
}

fn parse_cgroup2_relative_path(content: &str) -> Option<String> {
    // 0::/docker/abcd...
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("0::")?;
        Some(rest.to_string())
    })
}

fn parse_cgroup1_memory_relative_path(content: &str) -> Option<String> {
    // 5:memory:/kubepods.slice/...
    content.lines().find_map(|line| {
        let mut parts = line.splitn(3, ':');
        let _id = parts.next()?;
        let controllers = parts.next()?;
        if controllers.split(',').any(|c| c == "memory") {
            Some(parts.next().unwrap_or("").to_string())
        } else {
            None
        }
    })
}

fn strip_mount_root(root: &str, rel: &str) -> String {
    if root == "/" {
        return rel.to_string();
    }
    let prefix = root.trim_end_matches('/').trim_start_matches('/');
    let rel_no_leading = rel.trim_start_matches('/');
    match rel_no_leading.strip_prefix(prefix) {
        Some(stripped) => stripped.trim_start_matches('/').to_string(),
        None => rel.to_string(),
    }
}

fn join_mount_rel_file(mount_point: &str, rel: &str, file: &str) -> String {
    let base = mount_point.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        return format!("{base}/{file}");
    }
    format!("{base}/{rel}/{file}")
}
