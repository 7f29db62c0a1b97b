//! Per-Device Element Types
//!
//! Every (device, role) pair found at plugin load becomes its own element
//! type, e.g. `v4l20h264enc` for an H.264 encoder on `/dev/video0`. The
//! type derives from the role's abstract base type and carries, as class
//! data fixed at registration:
//! - the device node path (the class's default device),
//! - a "sink" and a "src" pad template with the caps probed from the device.
//!
//! ## Type Synthesis
//! The subtype is registered with `g_type_register_static` using the base
//! type's class and instance sizes. A heap-allocated [`SubtypeClosure`] is
//! passed as class data and consumed by the class initializer, which GLib
//! runs exactly once per type. Instance initialization is inherited from
//! the base type, which reads the default device from the class.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::ffi::CString;
use std::path::Path;
use std::sync::LazyLock;

use gst::glib;
use gst::glib::translate::{FromGlib, IntoGlib, ToGlibPtr};
use gstreamer as gst;

use crate::roles::{RoleEntry, RoleKind, RoleRegistry};

/// Debug category for device probing and type registration.
///
/// Set GST_DEBUG=v4l2codec:5 to see every probed device.
pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "v4l2codec",
        gst::DebugColorFlags::empty(),
        Some("V4L2 codec device registration"),
    )
});

/// Rank of generated element types, preferred over software codecs.
pub fn subtype_rank() -> gst::Rank {
    gst::Rank::PRIMARY + 1
}

type ClassInitFn = unsafe extern "C" fn(glib::ffi::gpointer, glib::ffi::gpointer);

/// Class data of one generated type.
///
/// Owned by the type system from registration until the class initializer
/// consumes it.
#[derive(Debug)]
pub struct SubtypeClosure {
    pub device_path: String,
    pub sink_caps: gst::Caps,
    pub src_caps: gst::Caps,
}

/// Class structs carrying a default device slot.
pub(crate) trait DeviceClass {
    fn set_default_device(&mut self, device: &'static str);
}

impl DeviceClass for crate::v4l2videoenc::Class {
    fn set_default_device(&mut self, device: &'static str) {
        self.default_device = Some(device);
    }
}

impl DeviceClass for crate::v4l2videodec::Class {
    fn set_default_device(&mut self, device: &'static str) {
        self.default_device = Some(device);
    }
}

/// Class initializer of a generated type.
///
/// # Safety
///
/// `g_class` must point to a class struct starting with `C`, and
/// `class_data` must come from `Box::<SubtypeClosure>::into_raw`. Called by
/// GLib once per type.
unsafe extern "C" fn subtype_class_init<C: DeviceClass>(
    g_class: glib::ffi::gpointer,
    class_data: glib::ffi::gpointer,
) {
    unsafe {
        let SubtypeClosure {
            device_path,
            sink_caps,
            src_caps,
        } = *Box::from_raw(class_data as *mut SubtypeClosure);

        // Lives as long as the type, which is never unregistered
        let device: &'static str = Box::leak(device_path.into_boxed_str());
        (*(g_class as *mut C)).set_default_device(device);

        let element_class = g_class as *mut gst::ffi::GstElementClass;
        for (name, direction, caps) in [
            ("sink", gst::PadDirection::Sink, &sink_caps),
            ("src", gst::PadDirection::Src, &src_caps),
        ] {
            match gst::PadTemplate::new(name, direction, gst::PadPresence::Always, caps) {
                Ok(templ) => {
                    gst::ffi::gst_element_class_add_pad_template(
                        element_class,
                        templ.to_glib_none().0,
                    );
                }
                Err(err) => {
                    gst::error!(
                        CAT,
                        "Failed to create {} pad template for {}: {}",
                        name,
                        device,
                        err
                    );
                }
            }
        }

        gst::debug!(CAT, "Initialized class for {}", device);
    }
}

/// Name of the type and element generated for `basename` and `suffix`.
pub fn subtype_name(basename: &str, suffix: &str) -> String {
    format!("v4l2{basename}{suffix}")
}

/// Derives the basename of a device node: its file name without the
/// `video` prefix, so `/dev/video0` gives `0`.
pub fn basename_from_path(device_path: &str) -> String {
    let file_name = Path::new(device_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| device_path.to_owned());

    match file_name.strip_prefix("video") {
        Some(rest) if !rest.is_empty() => rest.to_owned(),
        _ => file_name,
    }
}

fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    name.len() >= 3
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

/// Registers a new type derived from `parent`.
///
/// # Safety
///
/// `class_init` must accept the class struct layout of `parent` and consume
/// a `SubtypeClosure` passed as class data.
unsafe fn register_subtype(
    parent: glib::Type,
    type_name: &str,
    class_init: unsafe extern "C" fn(glib::ffi::gpointer, glib::ffi::gpointer),
    closure: Box<SubtypeClosure>,
) -> Result<glib::Type, glib::BoolError> {
    unsafe {
        let mut query = std::mem::MaybeUninit::<glib::gobject_ffi::GTypeQuery>::zeroed();
        glib::gobject_ffi::g_type_query(parent.into_glib(), query.as_mut_ptr());
        let query = query.assume_init();
        if query.type_ == glib::Type::INVALID.into_glib() {
            return Err(glib::bool_error!("Invalid parent type {}", parent));
        }

        let class_size = u16::try_from(query.class_size)
            .map_err(|_| glib::bool_error!("Class of {} too large", parent))?;
        let instance_size = u16::try_from(query.instance_size)
            .map_err(|_| glib::bool_error!("Instance of {} too large", parent))?;
        let c_name = CString::new(type_name)
            .map_err(|_| glib::bool_error!("Invalid type name {}", type_name))?;

        let class_data = Box::into_raw(closure);
        let info = glib::gobject_ffi::GTypeInfo {
            class_size,
            base_init: None,
            base_finalize: None,
            class_init: Some(class_init),
            class_finalize: None,
            class_data: class_data as glib::ffi::gconstpointer,
            instance_size,
            n_preallocs: 0,
            instance_init: None,
            value_table: std::ptr::null(),
        };

        let subtype = glib::gobject_ffi::g_type_register_static(
            parent.into_glib(),
            c_name.as_ptr(),
            &info,
            0,
        );
        if subtype == glib::Type::INVALID.into_glib() {
            // Never handed to a class initializer
            drop(Box::from_raw(class_data));
            return Err(glib::bool_error!("Failed to register type {}", type_name));
        }

        Ok(glib::Type::from_glib(subtype))
    }
}

/// Registers the element type of `role` for one device.
///
/// The type and element are both named `v4l2<basename><suffix>` and
/// registered at [`subtype_rank`].
///
/// # Errors
///
/// Fails without registering anything if the name is already taken or not
/// a valid type name, and when GLib or GStreamer refuse the registration.
pub fn register_role(
    plugin: Option<&gst::Plugin>,
    basename: &str,
    device_path: &str,
    sink_caps: &gst::Caps,
    src_caps: &gst::Caps,
    role: &RoleEntry,
) -> Result<glib::Type, glib::BoolError> {
    let type_name = subtype_name(basename, role.name_suffix);

    if !is_valid_type_name(&type_name) {
        return Err(glib::bool_error!("Invalid element name {}", type_name));
    }
    if glib::Type::from_name(&type_name).is_some() {
        return Err(glib::bool_error!("Type {} already registered", type_name));
    }

    let class_init: ClassInitFn = match role.kind {
        RoleKind::Encoder => subtype_class_init::<crate::v4l2videoenc::Class>,
        RoleKind::Decoder => subtype_class_init::<crate::v4l2videodec::Class>,
    };
    let closure = Box::new(SubtypeClosure {
        device_path: device_path.to_owned(),
        sink_caps: sink_caps.clone(),
        src_caps: src_caps.clone(),
    });

    // Safety: the encoder and decoder base types use the class structs
    // selected above, and every role derives from one of them.
    let subtype = unsafe { register_subtype((role.base_type)(), &type_name, class_init, closure)? };

    gst::Element::register(plugin, &type_name, subtype_rank(), subtype)?;

    gst::info!(
        CAT,
        "Registered {} for {} (sink {}, src {})",
        type_name,
        device_path,
        sink_caps,
        src_caps
    );

    Ok(subtype)
}

/// Registers the first role of `registry` matching the caps pair.
///
/// Returns `Ok(None)` when no role matches, which is not an error.
pub fn register_first_match(
    registry: &RoleRegistry,
    plugin: Option<&gst::Plugin>,
    basename: &str,
    device_path: &str,
    sink_caps: &gst::Caps,
    src_caps: &gst::Caps,
) -> Result<Option<glib::Type>, glib::BoolError> {
    match registry.find_first_match(sink_caps, src_caps) {
        Some(role) => {
            register_role(plugin, basename, device_path, sink_caps, src_caps, role).map(Some)
        }
        None => {
            gst::debug!(CAT, "{} matches no role", device_path);
            Ok(None)
        }
    }
}

/// Registers an H.264 encoder type for one device.
///
/// Returns `false` only when the registration itself fails.
pub fn register_h264_encoder(
    plugin: Option<&gst::Plugin>,
    basename: &str,
    device_path: &str,
    sink_caps: &gst::Caps,
    src_caps: &gst::Caps,
) -> bool {
    let role = crate::roles::h264_encoder_role();
    match register_role(plugin, basename, device_path, sink_caps, src_caps, &role) {
        Ok(_) => true,
        Err(err) => {
            gst::warning!(CAT, "Failed to register H.264 encoder for {}: {}", device_path, err);
            false
        }
    }
}

/// Registers the first builtin role matching the device's caps.
///
/// Always returns `true`: a device matching no role is skipped, and a
/// failed registration is logged as a warning so that the remaining
/// devices still get registered.
pub fn register_all_matching_roles(
    plugin: Option<&gst::Plugin>,
    basename: &str,
    device_path: &str,
    sink_caps: &gst::Caps,
    src_caps: &gst::Caps,
) -> bool {
    let registry = RoleRegistry::builtin();
    if let Err(err) =
        register_first_match(&registry, plugin, basename, device_path, sink_caps, src_caps)
    {
        gst::warning!(CAT, "Failed to register {}: {}", device_path, err);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basenames_drop_the_video_prefix() {
        assert_eq!(basename_from_path("/dev/video0"), "0");
        assert_eq!(basename_from_path("/dev/v4l2/video11"), "11");
        assert_eq!(basename_from_path("/dev/encoder"), "encoder");
        assert_eq!(basename_from_path("/dev/video"), "video");
    }

    #[test]
    fn type_names_are_validated() {
        assert_eq!(subtype_name("0", "h264enc"), "v4l20h264enc");
        assert!(is_valid_type_name("v4l20h264enc"));
        assert!(is_valid_type_name("v4l2my-encoder_1videodec"));
        assert!(!is_valid_type_name("v4l2a.bh264enc"));
        assert!(!is_valid_type_name("0abc"));
    }
}
