//               Copyright John Nunley, 2022.
// Distributed under the Boost Software License, Version 1.0.
//       (See accompanying file LICENSE or copy at
//         https://www.boost.org/LICENSE_1_0.txt)

//! Ownership of the replies and events `libxcb` hands out.

use core::{ops::Deref, ptr::NonNull};

/// A `malloc`ed value that we are responsible for freeing.
///
/// Every reply, error and event returned by `libxcb` is one of these.
pub(crate) struct CBox<T> {
    ptr: NonNull<T>,
}

impl<T> CBox<T> {
    /// Take ownership of `ptr`, or return `None` if it is null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to an initialized `T` that was allocated
    /// with `malloc` and is not owned by anyone else.
    pub(crate) unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| CBox { ptr })
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// View the allocation as a type no larger than `T`.
    ///
    /// # Safety
    ///
    /// The start of the allocation must hold a valid `U`.
    pub(crate) unsafe fn view<U>(&self) -> &U {
        debug_assert!(core::mem::size_of::<U>() <= core::mem::size_of::<T>());
        &*self.ptr.as_ptr().cast::<U>()
    }
}

impl<T> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Drop for CBox<T> {
    fn drop(&mut self) {
        unsafe {
            libc::free(self.as_ptr().cast());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CBox;

    #[test]
    fn null_is_not_owned() {
        assert!(unsafe { CBox::<u32>::from_raw(core::ptr::null_mut()) }.is_none());
    }

    #[test]
    fn owns_and_frees_malloc() {
        let ptr = unsafe { libc::malloc(core::mem::size_of::<[u8; 8]>()) } as *mut [u8; 8];
        assert!(!ptr.is_null());
        unsafe { ptr.write([1, 2, 3, 4, 5, 6, 7, 8]) };

        let boxed = unsafe { CBox::from_raw(ptr) }.unwrap();
        assert_eq!(boxed[7], 8);
        let head = unsafe { boxed.view::<[u8; 4]>() };
        assert_eq!(*head, [1, 2, 3, 4]);
    }
}
