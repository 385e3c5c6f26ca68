use std::fmt::{Debug, Display, Formatter, Write};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim0;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim1(pub usize);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim2(pub usize, pub usize);

impl Dim2 {
    #[inline]
    pub fn rows(&self) -> usize {
        self.0
    }
    #[inline]
    pub fn cols(&self) -> usize {
        self.1
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim3(pub usize, pub usize, pub usize);

/// (count, channels, height, width)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim4(pub usize, pub usize, pub usize, pub usize);

pub trait Dims: Copy + Debug + Eq + Display {
    const N: usize;
    type Less: Dims;
    fn major(&self) -> usize;
    fn tensor_len(&self) -> usize;
    fn as_vec(&self) -> Vec<usize>;
    fn remove_major(&self) -> Self::Less;
    fn resize_major(&self, size: usize) -> Self;
}

pub trait DimsZero: Dims {
    const ZERO: Self;
}

impl DimsZero for Dim0 {
    const ZERO: Self = Dim0;
}
impl DimsZero for Dim1 {
    const ZERO: Self = Dim1(0);
}
impl DimsZero for Dim2 {
    const ZERO: Self = Dim2(0, 0);
}
impl DimsZero for Dim3 {
    const ZERO: Self = Dim3(0, 0, 0);
}
impl DimsZero for Dim4 {
    const ZERO: Self = Dim4(0, 0, 0, 0);
}

fn fmt_dims(f: &mut Formatter<'_>, dims: &[usize]) -> std::fmt::Result {
    f.write_char('(')?;
    for (i, d) in dims.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        Display::fmt(d, f)?;
    }
    f.write_char(')')
}

impl Dims for Dim0 {
    const N: usize = 0;
    type Less = Self;
    #[inline]
    fn major(&self) -> usize {
        1
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        1
    }
    fn as_vec(&self) -> Vec<usize> {
        Vec::new()
    }
    fn remove_major(&self) -> Self::Less {
        Dim0
    }
    fn resize_major(&self, _size: usize) -> Self {
        Dim0
    }
}

impl Display for Dim0 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("()")
    }
}

impl Dims for Dim1 {
    const N: usize = 1;
    type Less = Dim0;
    #[inline]
    fn major(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0]
    }
    fn remove_major(&self) -> Self::Less {
        Dim0
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim1(size)
    }
}

impl Display for Dim1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_dims(f, &[self.0])
    }
}

impl Dims for Dim2 {
    const N: usize = 2;
    type Less = Dim1;
    #[inline]
    fn major(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1]
    }
    fn remove_major(&self) -> Self::Less {
        Dim1(self.1)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim2(size, self.1)
    }
}

impl Display for Dim2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_dims(f, &[self.0, self.1])
    }
}

impl Dims for Dim3 {
    const N: usize = 3;
    type Less = Dim2;
    #[inline]
    fn major(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2]
    }
    fn remove_major(&self) -> Self::Less {
        Dim2(self.1, self.2)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim3(size, self.1, self.2)
    }
}

impl Display for Dim3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_dims(f, &[self.0, self.1, self.2])
    }
}

impl Dims for Dim4 {
    const N: usize = 4;
    type Less = Dim3;
    #[inline]
    fn major(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2 * self.3
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2, self.3]
    }
    fn remove_major(&self) -> Self::Less {
        Dim3(self.1, self.2, self.3)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim4(size, self.1, self.2, self.3)
    }
}

impl Display for Dim4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_dims(f, &[self.0, self.1, self.2, self.3])
    }
}
