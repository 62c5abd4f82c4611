//! CAN 接口名校验与状态检查
//!
//! 使用 ioctl 系统调用检查 Linux 网络接口是否已启动（UP 状态）。
//!
//! 此模块仅提供检查功能，不进行任何配置操作，因此不需要特殊权限。
//! 接口的波特率与 UP/DOWN 状态由系统工具（`ip link`）在外部配置。

use libc::{AF_INET, IFF_UP, SIOCGIFFLAGS, SOCK_CLOEXEC, SOCK_DGRAM, ifreq};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tracing::trace;

/// ifr_name 为 IFNAMSIZ = 16 字节（含结尾 NUL），所以最大长度是 15
pub const MAX_IFACE_NAME_LEN: usize = libc::IFNAMSIZ - 1;

/// 校验接口名并转换为 C 字符串
///
/// # 错误
/// - `ErrorKind::InvalidInput`: 接口名为空、过长或包含 NUL 字符
pub fn validate_interface_name(interface: &str) -> io::Result<CString> {
    if interface.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Interface name is empty",
        ));
    }

    if interface.len() > MAX_IFACE_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Interface name '{}' is too long (max {} characters)",
                interface, MAX_IFACE_NAME_LEN
            ),
        ));
    }

    CString::new(interface).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid interface name: {}", e),
        )
    })
}

/// 检查接口是否处于管理态 UP
///
/// # 返回值
/// - `Ok(true)`: IFF_UP 标志位为真
/// - `Ok(false)`: 接口处于 DOWN 状态
/// - `Err(_)`: 接口名无效或系统调用失败（socket/ioctl 错误）
pub fn check_interface_status(interface: &str) -> io::Result<bool> {
    let name = validate_interface_name(interface)?;

    let mut ifr: ifreq = unsafe { std::mem::zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes_with_nul()) {
        *dst = *src as libc::c_char;
    }

    let raw = unsafe { libc::socket(AF_INET, SOCK_DGRAM | SOCK_CLOEXEC, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: raw 是刚创建的有效 fd，所有权转移给 OwnedFd，离开作用域时关闭
    let sock = unsafe { OwnedFd::from_raw_fd(raw) };

    let result = unsafe {
        libc::ioctl(
            sock.as_raw_fd(),
            SIOCGIFFLAGS,
            &mut ifr as *mut _ as *mut libc::c_void,
        )
    };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    // ifru_flags 是 ifr_ifru union 的第一个字段，类型为 c_short
    let flags = unsafe { *(std::ptr::addr_of!(ifr.ifr_ifru) as *const libc::c_short) };
    let is_up = (flags as i32 & IFF_UP) != 0;

    trace!(
        "Interface '{}' status: {}",
        interface,
        if is_up { "UP" } else { "DOWN" }
    );
    Ok(is_up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn interface_exists(interface: &str) -> bool {
        Command::new("ip")
            .args(["link", "show", interface])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_validate_interface_name_ok() {
        let name = validate_interface_name("vcan0").unwrap();
        assert_eq!(name.as_bytes(), b"vcan0");

        let longest = "a".repeat(MAX_IFACE_NAME_LEN);
        assert!(validate_interface_name(&longest).is_ok());
    }

    #[test]
    fn test_validate_interface_name_too_long() {
        let err = validate_interface_name(&"a".repeat(20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("too long"), "got: {}", err);
    }

    #[test]
    fn test_validate_interface_name_nul() {
        let err = validate_interface_name("can0\0").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("Invalid interface name"));
    }

    #[test]
    fn test_validate_interface_name_empty() {
        let err = validate_interface_name("").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_check_interface_status_not_exists() {
        assert!(check_interface_status("canx999").is_err());
    }

    #[test]
    fn test_check_interface_status_loopback() {
        if !interface_exists("lo") {
            eprintln!("Skipping test: lo does not exist");
            return;
        }
        let result = check_interface_status("lo");
        assert!(result.is_ok(), "ioctl should succeed on lo: {:?}", result);
    }
}
