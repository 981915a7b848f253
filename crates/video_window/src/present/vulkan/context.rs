//! Process-wide Vulkan objects
//!
//! The context is created once, before any window exists, and shared by
//! every presenter through an `Arc`. Physical device selection does not look
//! at a surface: presentation support is checked per window when its surface
//! is created.

use std::ffi::{c_char, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use parking_lot::{Mutex, MutexGuard};

use super::cache::ObjectCache;
use crate::config::RendererSettings;
use crate::present::{PresentError, PresentResult};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Physical device chosen for presentation
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Device handle
    pub device: vk::PhysicalDevice,
    /// Properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family used for both graphics and presentation
    pub graphics_family: u32,
}

impl PhysicalDeviceInfo {
    /// Name reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Instance, device and shared caches
pub struct VulkanContext {
    cache: Mutex<ObjectCache>,
    queue: Mutex<vk::Queue>,
    swapchain_loader: SwapchainLoader,
    surface_loader: Surface,
    device: Device,
    physical_device: PhysicalDeviceInfo,
    debug: Option<DebugMessenger>,
    instance: Instance,
    entry: Entry,
}

impl VulkanContext {
    /// Create the instance and device
    ///
    /// `instance_extensions` are the extensions the windowing toolkit needs
    /// to create surfaces.
    pub fn new(settings: &RendererSettings, instance_extensions: &[String]) -> PresentResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| PresentError::Initialization(format!("Failed to load Vulkan: {}", e)))?;

        let validation = settings.validation_enabled() && Self::has_layer(&entry, VALIDATION_LAYER);
        if settings.validation_enabled() && !validation {
            log::warn!("{} requested but not installed", VALIDATION_LAYER);
        }

        let app_name = CString::new(settings.application_name.as_str())
            .map_err(|e| PresentError::Initialization(format!("Invalid application name: {}", e)))?;
        let engine_name = CString::new("video_window")
            .map_err(|e| PresentError::Initialization(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_names = instance_extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PresentError::Initialization(format!("Invalid extension name: {}", e)))?;
        let mut extensions: Vec<*const c_char> = extension_names.iter().map(|name| name.as_ptr()).collect();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation {
            vec![CString::new(VALIDATION_LAYER).map_err(|e| PresentError::Initialization(e.to_string()))?]
        } else {
            Vec::new()
        };
        let layers: Vec<*const c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            match Self::create_debug_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    log::warn!("Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let physical_device = match Self::select_physical_device(&instance) {
            Ok(info) => info,
            Err(e) => {
                unsafe { Self::destroy_instance(&instance, debug.as_ref()) };
                return Err(e);
            }
        };
        log::info!("Selected GPU: {}", physical_device.name());

        let device = match Self::create_device(&instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { Self::destroy_instance(&instance, debug.as_ref()) };
                return Err(e);
            }
        };
        let queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };

        Ok(Self {
            cache: Mutex::new(ObjectCache::default()),
            queue: Mutex::new(queue),
            swapchain_loader: SwapchainLoader::new(&instance, &device),
            surface_loader: Surface::new(&entry, &instance),
            device,
            physical_device,
            debug,
            instance,
            entry,
        })
    }

    fn has_layer(entry: &Entry, name: &str) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers.iter().any(|layer| {
                    let layer_name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    layer_name.to_string_lossy() == name
                })
            })
            .unwrap_or(false)
    }

    fn create_debug_messenger(entry: &Entry, instance: &Instance) -> PresentResult<DebugMessenger> {
        let loader = DebugUtils::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        Ok(DebugMessenger { loader, messenger })
    }

    fn select_physical_device(instance: &Instance) -> PresentResult<PhysicalDeviceInfo> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        let mut candidates: Vec<PhysicalDeviceInfo> = devices
            .into_iter()
            .filter_map(|device| Self::evaluate_device(instance, device))
            .collect();

        // Discrete GPUs first
        candidates.sort_by_key(|info| info.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU);
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| PresentError::Initialization("No suitable GPU found".to_string()))
    }

    fn evaluate_device(instance: &Instance, device: vk::PhysicalDevice) -> Option<PhysicalDeviceInfo> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let graphics_family = families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return None;
        }

        Some(PhysicalDeviceInfo {
            device,
            properties: unsafe { instance.get_physical_device_properties(device) },
            memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
            graphics_family: u32::try_from(graphics_family).ok()?,
        })
    }

    fn create_device(instance: &Instance, info: &PhysicalDeviceInfo) -> PresentResult<Device> {
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(info.graphics_family)
            .queue_priorities(&priorities)
            .build()];
        let extensions = [SwapchainLoader::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::builder();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);
        Ok(unsafe { instance.create_device(info.device, &create_info, None)? })
    }

    unsafe fn destroy_instance(instance: &Instance, debug: Option<&DebugMessenger>) {
        if let Some(debug) = debug {
            debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
        }
        instance.destroy_instance(None);
    }

    /// Whether the graphics queue family can present to `surface`
    pub fn supports_surface(&self, surface: vk::SurfaceKHR) -> PresentResult<bool> {
        Ok(unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device.device,
                self.physical_device.graphics_family,
                surface,
            )?
        })
    }

    /// Vulkan entry points
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// `VK_KHR_surface` functions
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// `VK_KHR_swapchain` functions
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Queue used for rendering and presentation; submissions are serialized
    pub fn queue(&self) -> MutexGuard<'_, vk::Queue> {
        self.queue.lock()
    }

    /// Objects shared by every window on this device
    pub fn cache(&self) -> MutexGuard<'_, ObjectCache> {
        self.cache.lock()
    }

    /// Index of a memory type matching `type_bits` and `properties`
    pub fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> PresentResult<u32> {
        let memory = &self.physical_device.memory_properties;
        (0..memory.memory_type_count)
            .find(|&index| {
                type_bits & (1 << index) != 0
                    && memory.memory_types[index as usize].property_flags.contains(properties)
            })
            .ok_or(PresentError::NoSuitableMemoryType)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::error!("device_wait_idle failed during shutdown: {:?}", e);
            }
            self.cache.get_mut().destroy(&self.device);
            self.device.destroy_device(None);
            Self::destroy_instance(&self.instance, self.debug.as_ref());
        }
    }
}

/// Routes validation messages into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
